use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Longest session (and access-token) lifetime the store accepts.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Session id -> (username, expires_at). Expired entries are evicted on read
/// and swept on every new session.
#[derive(Debug)]
pub struct SessionStore {
    inner: DashMap<String, (String, Instant)>,
    ttl: Duration,
}

impl SessionStore {
    /// `ttl` is clamped to [`MAX_SESSION_TTL`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl: ttl.min(MAX_SESSION_TTL),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(&self, username: String) -> String {
        let now = Instant::now();
        self.inner.retain(|_, (_, expires)| *expires > now);

        let id = uuid::Uuid::new_v4().to_string();
        let expires = now.checked_add(self.ttl).unwrap_or(now);
        self.inner.insert(id.clone(), (username, expires));
        id
    }

    pub fn get(&self, id: &str) -> Option<String> {
        let entry = self.inner.get(id)?;
        if entry.1 > Instant::now() {
            Some(entry.0.clone())
        } else {
            drop(entry);
            self.inner.remove(id);
            None
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner.remove(id).is_some()
    }

    /// Live sessions only.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .iter()
            .filter(|entry| entry.value().1 > now)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{SessionStore, MAX_SESSION_TTL};

    #[test]
    fn created_session_resolves_to_its_user() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create(String::from("alice"));
        assert_eq!(store.get(&id).as_deref(), Some("alice"));
        assert_eq!(store.get("unknown"), None);
    }

    #[test]
    fn expired_session_is_evicted_on_read() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create(String::from("alice"));
        assert_eq!(store.get(&id), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn unread_expired_sessions_are_swept_on_create() {
        let store = SessionStore::new(Duration::ZERO);
        for _ in 0..5 {
            store.create(String::from("alice"));
        }
        assert!(store.inner.len() <= 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn len_counts_live_sessions() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.create(String::from("alice"));
        store.create(String::from("bob"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let store = SessionStore::new(Duration::from_secs(u64::MAX));
        assert_eq!(store.ttl(), MAX_SESSION_TTL);
        let id = store.create(String::from("alice"));
        assert_eq!(store.get(&id).as_deref(), Some("alice"));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create(String::from("bob"));
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert_eq!(store.get(&id), None);
    }
}
