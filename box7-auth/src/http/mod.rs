//! HTTP layer: Axum router, auth route handlers and CORS shaping.
//!
//! Exposes `/login`, `/register`, `/logout`, `/check-auth` and `/me` (each also
//! with a trailing slash) plus `/health`.

mod cors;
mod error;
mod handlers;
mod state;


pub use handlers::router;
pub use state::AppState;
