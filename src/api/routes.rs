use anyhow::Result;
use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use sqlx::PgPool;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use super::auth::auth_routes;
use super::health::health_check;
use super::instructor::instructor_routes;
use super::player::player_routes;
use super::state::AppState;
use crate::auth::{
    cors_layer, instructor_only_middleware, jwt_auth_middleware, player_only_middleware,
    security_headers_layer, RateLimiter,
};
use crate::config::AppConfig;
use crate::services::MAX_IMPORT_BYTES;

const LOGIN_WINDOW: Duration = Duration::from_secs(60);

/// Request body cap; leaves room for multipart framing around the largest upload
pub const MAX_REQUEST_BYTES: usize = MAX_IMPORT_BYTES + 64 * 1024;

pub fn create_routes(db: PgPool, config: &AppConfig) -> Result<Router> {
    let state = AppState::new(db, config)?;
    let rate_limiter = RateLimiter::new(config.login_rate_limit, LOGIN_WINDOW)
        .with_proxy_headers(config.trust_proxy_headers);

    let instructor = instructor_routes()
        .route_layer(middleware::from_fn(instructor_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.auth_service.clone(),
            jwt_auth_middleware,
        ));

    let player = player_routes()
        .route_layer(middleware::from_fn(player_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            state.auth_service.clone(),
            jwt_auth_middleware,
        ));

    let router = Router::new()
        .route("/healthz", get(health_check))
        .nest("/api/auth", auth_routes(state.auth_service.clone(), rate_limiter))
        .nest("/api/instructor", instructor)
        .nest("/api/player", player)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(security_headers_layer())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
