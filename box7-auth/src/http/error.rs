use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::auth::AuthError;

/// Errors leave the auth layer unchanged: same status class, same message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::NotAuthenticated
                | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::UserExists => StatusCode::CONFLICT,
                AuthError::Hashing(_) | AuthError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
