use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use super::error::ApiError;
use crate::auth::{
    jwt_auth_middleware, login_rate_limit_middleware, AccountInfo, AuthResponse, AuthService,
    LoginRequest, MessageResponse, RateLimiter, Session,
};

/// Login, logout and current-account routes
pub fn auth_routes<S>(auth_service: AuthService, rate_limiter: RateLimiter) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/login",
            post(login).route_layer(middleware::from_fn_with_state(
                rate_limiter,
                login_rate_limit_middleware,
            )),
        )
        .route(
            "/logout",
            post(logout).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .route(
            "/me",
            get(me).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .with_state(auth_service)
}

/// Exchange a login code for a bearer token
#[tracing::instrument(skip(auth_service, request))]
async fn login(
    State(auth_service): State<AuthService>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = auth_service.login(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip_all)]
async fn logout(
    State(auth_service): State<AuthService>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let response = auth_service.logout(bearer.token()).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip_all)]
async fn me(Extension(session): Extension<Session>) -> Json<AccountInfo> {
    Json(session.account())
}
