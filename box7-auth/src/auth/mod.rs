//! Account directory, password hashing, access tokens and sessions.
//!
//! The HTTP layer only shapes responses around the operations here; every
//! credential check, session lookup and token issuance happens in [`AuthService`].

mod password;
mod session;
mod token;
mod users_file;

use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    AuthStatus, LoginResponse, LogoutResponse, UserInfo, UserLogin, UserRegistration,
};

use self::password::{hash_password, verify_password};
use self::session::SessionStore;
pub use self::session::MAX_SESSION_TTL;
use self::token::TokenSigner;
pub use self::token::Claims;
pub use self::users_file::{load_users_file, SeedUser};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("username already registered")]
    UserExists,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("token signing failed: {0}")]
    Token(String),
}

struct StoredUser {
    info: UserInfo,
    password_hash: String,
}

impl std::fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUser")
            .field("info", &self.info)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Successful login: the JSON body plus the session id to put in the cookie.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session_id: String,
    pub body: LoginResponse,
}

#[derive(Debug)]
pub struct AuthService {
    users: DashMap<String, StoredUser>,
    sessions: SessionStore,
    tokens: TokenSigner,
}

impl AuthService {
    /// Access tokens live as long as sessions.
    pub fn new(jwt_secret: &[u8], session_ttl: Duration) -> Self {
        let sessions = SessionStore::new(session_ttl);
        let tokens = TokenSigner::new(jwt_secret, sessions.ttl().as_secs());
        Self {
            users: DashMap::new(),
            sessions,
            tokens,
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_ttl(&self) -> Duration {
        self.sessions.ttl()
    }

    /// Insert or replace accounts from the users file.
    pub async fn seed_users(&self, users: Vec<SeedUser>) -> Result<usize, AuthError> {
        let mut seeded = 0;
        for user in users {
            let password_hash = hash_blocking(user.password).await?;
            let info = UserInfo {
                username: user.username.clone(),
                email: user.email.unwrap_or_default(),
                full_name: user.full_name,
                created_at: Utc::now(),
            };
            self.users.insert(
                user.username,
                StoredUser {
                    info,
                    password_hash,
                },
            );
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Stores the account as given; content rules are the caller's business.
    pub async fn register_user(&self, registration: UserRegistration) -> Result<UserInfo, AuthError> {
        if self.users.contains_key(&registration.username) {
            return Err(AuthError::UserExists);
        }

        let password_hash = hash_blocking(registration.password).await?;
        let info = UserInfo {
            username: registration.username.clone(),
            email: registration.email,
            full_name: registration.full_name,
            created_at: Utc::now(),
        };

        // Re-checked here: another registration may have won while hashing.
        match self.users.entry(registration.username) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(slot) => {
                slot.insert(StoredUser {
                    info: info.clone(),
                    password_hash,
                });
                info!(username = %info.username, "user registered");
                Ok(info)
            }
        }
    }

    pub async fn login_user(&self, credentials: UserLogin) -> Result<LoginOutcome, AuthError> {
        let stored = self
            .users
            .get(&credentials.username)
            .map(|user| (user.password_hash.clone(), user.info.clone()));

        let hash = stored.as_ref().map(|(hash, _)| hash.clone());
        let password = credentials.password;
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, hash.as_deref()))
            .await
            .map_err(|err| AuthError::Hashing(err.to_string()))?;

        let Some((_, user)) = stored.filter(|_| valid) else {
            debug!(username = %credentials.username, "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let access_token = self.tokens.issue(&user.username)?;
        let session_id = self.sessions.create(user.username.clone());
        info!(username = %user.username, "user logged in");

        Ok(LoginOutcome {
            session_id,
            body: LoginResponse {
                access_token,
                token_type: "bearer",
                expires_in: self.sessions.ttl().as_secs(),
                user,
            },
        })
    }

    /// Always succeeds; logging out twice is harmless.
    pub fn logout_user(&self, session: Option<&str>) -> LogoutResponse {
        if let Some(id) = session {
            if self.sessions.remove(id) {
                debug!("session removed");
            }
        }
        LogoutResponse {
            message: "logged out",
        }
    }

    pub fn check_auth_status(&self, session: Option<&str>) -> AuthStatus {
        let user = session.and_then(|id| self.resolve_session(id));
        AuthStatus {
            authenticated: user.is_some(),
            user,
        }
    }

    pub fn get_current_user_info(&self, session: Option<&str>) -> Result<UserInfo, AuthError> {
        session
            .and_then(|id| self.resolve_session(id))
            .ok_or(AuthError::NotAuthenticated)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(token)
    }

    /// Current user from a login access token instead of a session.
    pub fn user_from_token(&self, token: &str) -> Result<UserInfo, AuthError> {
        let claims = self.verify_token(token)?;
        self.users
            .get(&claims.sub)
            .map(|user| user.info.clone())
            .ok_or(AuthError::NotAuthenticated)
    }

    pub fn token_status(&self, token: &str) -> AuthStatus {
        let user = self.user_from_token(token).ok();
        AuthStatus {
            authenticated: user.is_some(),
            user,
        }
    }

    fn resolve_session(&self, id: &str) -> Option<UserInfo> {
        let username = self.sessions.get(id)?;
        self.users.get(&username).map(|user| user.info.clone())
    }
}

async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AuthError::Hashing(err.to_string()))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;

    use super::{AuthError, AuthService, SeedUser, MAX_SESSION_TTL};
    use crate::models::{UserLogin, UserRegistration};

    fn service() -> AuthService {
        AuthService::new(b"test-secret", Duration::from_secs(3600))
    }

    fn registration(username: &str, password: &str) -> UserRegistration {
        UserRegistration {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: password.to_string(),
            full_name: None,
        }
    }

    fn login(username: &str, password: &str) -> UserLogin {
        UserLogin {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_issues_session_and_token() -> Result<()> {
        let auth = service();
        let info = auth.register_user(registration("alice", "pw")).await?;
        assert_eq!(info.email, "alice@example.com");

        let outcome = auth.login_user(login("alice", "pw")).await?;
        assert_eq!(outcome.body.token_type, "bearer");
        assert_eq!(outcome.body.expires_in, 3600);
        assert_eq!(auth.verify_token(&outcome.body.access_token)?.sub, "alice");

        let me = auth.get_current_user_info(Some(&outcome.session_id))?;
        assert_eq!(me.username, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() -> Result<()> {
        let auth = service();
        auth.register_user(registration("alice", "pw")).await?;
        let err = auth
            .register_user(registration("alice", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
        assert_eq!(auth.user_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_invalid_credentials() -> Result<()> {
        let auth = service();
        auth.register_user(registration("alice", "pw")).await?;

        let wrong = auth.login_user(login("alice", "nope")).await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        let unknown = auth.login_user(login("mallory", "pw")).await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(auth.session_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn logout_ends_session() -> Result<()> {
        let auth = service();
        auth.register_user(registration("alice", "pw")).await?;
        let outcome = auth.login_user(login("alice", "pw")).await?;

        assert!(auth.check_auth_status(Some(&outcome.session_id)).authenticated);
        auth.logout_user(Some(&outcome.session_id));
        auth.logout_user(Some(&outcome.session_id));
        auth.logout_user(None);

        let status = auth.check_auth_status(Some(&outcome.session_id));
        assert!(!status.authenticated);
        assert!(status.user.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn missing_session_is_not_authenticated() {
        let auth = service();
        assert!(!auth.check_auth_status(None).authenticated);
        assert!(matches!(
            auth.get_current_user_info(None),
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            auth.get_current_user_info(Some("made-up")),
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn expired_session_is_not_honored() -> Result<()> {
        let auth = AuthService::new(b"test-secret", Duration::ZERO);
        auth.register_user(registration("alice", "pw")).await?;
        let outcome = auth.login_user(login("alice", "pw")).await?;

        assert!(!auth.check_auth_status(Some(&outcome.session_id)).authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn access_token_resolves_user() -> Result<()> {
        let auth = service();
        auth.register_user(registration("alice", "pw")).await?;
        let outcome = auth.login_user(login("alice", "pw")).await?;

        let user = auth.user_from_token(&outcome.body.access_token)?;
        assert_eq!(user.username, "alice");
        assert!(auth.token_status(&outcome.body.access_token).authenticated);
        assert!(matches!(
            auth.user_from_token("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
        assert!(!auth.token_status("not.a.jwt").authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_ttl_does_not_break_login() -> Result<()> {
        let huge = humantime::parse_duration("500000000000years")?;
        let auth = AuthService::new(b"test-secret", huge);
        auth.register_user(registration("alice", "pw")).await?;

        let outcome = auth.login_user(login("alice", "pw")).await?;
        assert_eq!(outcome.body.expires_in, MAX_SESSION_TTL.as_secs());
        assert!(auth.check_auth_status(Some(&outcome.session_id)).authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn seeded_users_can_log_in_and_replace_existing() -> Result<()> {
        let auth = service();
        auth.register_user(registration("alice", "old")).await?;
        let seeded = auth
            .seed_users(vec![SeedUser {
                username: String::from("alice"),
                password: String::from("new"),
                email: None,
                full_name: Some(String::from("Alice")),
            }])
            .await?;

        assert_eq!(seeded, 1);
        assert!(auth.login_user(login("alice", "old")).await.is_err());
        let outcome = auth.login_user(login("alice", "new")).await?;
        assert_eq!(outcome.body.user.full_name.as_deref(), Some("Alice"));
        assert_eq!(outcome.body.user.email, "");
        Ok(())
    }
}
