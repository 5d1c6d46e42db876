//! # box7-auth
//!
//! Authentication routes for the Box7 web client.
//!
//! Serves login, registration, logout, session check and current-user lookup
//! over HTTP, with session cookies and credentialed CORS for a fixed set of
//! browser origins.
//!
//! ## Architecture
//!
//! - **Auth**: in-memory accounts with Argon2 password hashes, HS256 access tokens,
//!   and a TTL-bounded session store keyed by the `session` cookie
//! - **HTTP**: Axum router that delegates to the auth service and adds CORS headers
//!   for allow-listed origins, with rate limiting, request IDs and graceful shutdown
//! - **Config**: CLI flags, optional TOML file, `BOX7_*` environment variables

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod http;
mod models;

use std::net::SocketAddr;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::{load_users_file, AuthService};
use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;

    let jwt_secret = match config.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("BOX7_JWT_SECRET not set; using a random per-process secret");
            format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
        }
    };
    let auth = AuthService::new(jwt_secret.as_bytes(), config.session_ttl);

    if let Some(path) = config.users_file.as_deref() {
        let users = load_users_file(path).context("failed to load users file")?;
        let seeded = auth
            .seed_users(users)
            .await
            .context("failed to seed users")?;
        info!(path = %path.display(), users = seeded, "users file loaded");
    }

    info!(
        bind = %config.bind,
        allowed_origins = ?config.allowed_origins,
        session_ttl = %humantime::format_duration(config.session_ttl),
        cookie_secure = config.cookie_secure,
        users = auth.user_count(),
        "configuration loaded"
    );

    let state = AppState::new(auth, config.allowed_origins, config.cookie_secure);

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "box7-auth listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
