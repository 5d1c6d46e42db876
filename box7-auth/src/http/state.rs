use std::sync::Arc;

use crate::auth::AuthService;

use super::cors::CorsPolicy;

#[derive(Debug, Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub cors: Arc<CorsPolicy>,
    /// Adds `Secure` (and `SameSite=None`) to the session cookie.
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(auth: AuthService, allowed_origins: Vec<String>, cookie_secure: bool) -> Self {
        Self {
            auth: Arc::new(auth),
            cors: Arc::new(CorsPolicy::new(allowed_origins)),
            cookie_secure,
        }
    }
}
