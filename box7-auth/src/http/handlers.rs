use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, error};

use crate::models::{UserLogin, UserRegistration};

use super::cors::{add_cors_headers, preflight};
use super::error::ApiError;
use super::state::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    users: usize,
    sessions: usize,
}

/// One token refills every 5 ms (200 requests/s) across all clients.
const RATE_LIMIT_REFILL_MS: u64 = 5;
const RATE_LIMIT_BURST: u32 = 200;

pub fn router(state: AppState) -> Router {
    #[allow(clippy::expect_used)]
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(RATE_LIMIT_REFILL_MS)
            .burst_size(RATE_LIMIT_BURST)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("rate limit config is valid"),
    );

    let routes = Router::new().route("/health", get(health));
    let routes = with_trailing_slash(routes, "/login", post(login).options(preflight));
    let routes = with_trailing_slash(routes, "/register", post(register).options(preflight));
    let routes = with_trailing_slash(routes, "/logout", post(logout).options(preflight));
    let routes = with_trailing_slash(routes, "/check-auth", get(check_auth).options(preflight));
    let routes = with_trailing_slash(routes, "/me", get(me).options(preflight));

    routes
        .layer(GovernorLayer::new(governor_conf))
        .layer(
            tower_http::request_id::SetRequestIdLayer::new(
                axum::http::header::HeaderName::from_static("x-request-id"),
                tower_http::request_id::MakeRequestUuid::default(),
            ),
        )
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `path` and `path/` with the same handlers.
fn with_trailing_slash(
    router: Router<AppState>,
    path: &str,
    method: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, method.clone())
        .route(&format!("{path}/"), method)
}

fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    let mut parts = raw.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return None;
    }
    Some(token)
}

fn session_cookie(id: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE, id))
        .http_only(true)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .secure(secure)
        .path("/")
        .max_age(cookie::time::Duration::seconds(max_age))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        users: state.auth.user_count(),
        sessions: state.auth.session_count(),
    })
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(credentials): Json<UserLogin>,
) -> Result<Response, ApiError> {
    let outcome = match state.auth.login_user(credentials).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "login failed");
            return Err(err.into());
        }
    };

    let jar = jar.add(session_cookie(
        outcome.session_id,
        state.auth.session_ttl(),
        state.cookie_secure,
    ));
    Ok(add_cors_headers(
        &state.cors,
        &headers,
        (jar, Json(outcome.body)).into_response(),
    ))
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(registration): Json<UserRegistration>,
) -> Result<Response, ApiError> {
    let user = state.auth.register_user(registration).await?;
    Ok(add_cors_headers(
        &state.cors,
        &headers,
        (StatusCode::CREATED, Json(user)).into_response(),
    ))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let session = session_id(&jar);
    let body = state.auth.logout_user(session.as_deref());
    debug!(had_session = session.is_some(), "logout requested");
    let jar = jar.add(removal_cookie());
    add_cors_headers(&state.cors, &headers, (jar, Json(body)).into_response())
}

/// The session cookie wins; the access token is only consulted without one.
async fn check_auth(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let status = match (session_id(&jar), bearer_token(&headers)) {
        (None, Some(token)) => state.auth.token_status(token),
        (session, _) => state.auth.check_auth_status(session.as_deref()),
    };
    add_cors_headers(&state.cors, &headers, Json(status).into_response())
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let user = match (session_id(&jar), bearer_token(&headers)) {
        (None, Some(token)) => state.auth.user_from_token(token)?,
        (session, _) => state.auth.get_current_user_info(session.as_deref())?,
    };
    Ok(add_cors_headers(
        &state.cors,
        &headers,
        Json(user).into_response(),
    ))
}
