use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::state::AppState;

/// Exact-match origin allow-list. No wildcard, no normalization.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// The request's `Origin` header, if it is on the allow-list.
    pub fn allowed_origin<'a>(&self, request_headers: &'a HeaderMap) -> Option<&'a HeaderValue> {
        let origin = request_headers.get(ORIGIN)?;
        self.allowed
            .iter()
            .any(|allowed| allowed.as_bytes() == origin.as_bytes())
            .then_some(origin)
    }
}

/// Sets `Access-Control-Allow-Origin` and `Access-Control-Allow-Credentials`
/// for allow-listed origins; any other request leaves the response untouched.
pub fn add_cors_headers(
    policy: &CorsPolicy,
    request_headers: &HeaderMap,
    mut response: Response,
) -> Response {
    if let Some(origin) = policy.allowed_origin(request_headers) {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    response
}

/// `OPTIONS` on an auth route.
pub async fn preflight(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut response = add_cors_headers(
        &state.cors,
        &headers,
        StatusCode::NO_CONTENT.into_response(),
    );
    if response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
        let headers = response.headers_mut();
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type"),
        );
    } else {
        debug!("preflight from origin outside allow-list");
    }
    response
}
