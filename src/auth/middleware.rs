use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{extract_bearer_token, AuthError, AuthService, Role, Session};

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(auth_service): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let session = auth_service.validate_session(token).await?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

fn require_role(request: &Request, role: Role) -> Result<(), AuthError> {
    let session = request
        .extensions()
        .get::<Session>()
        .ok_or(AuthError::InsufficientPermissions)?;

    if session.role != role {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(())
}

/// Instructor-only middleware, layered after `jwt_auth_middleware`
pub async fn instructor_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, Role::Instructor)?;
    Ok(next.run(request).await)
}

/// Player-only middleware, layered after `jwt_auth_middleware`
pub async fn player_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    require_role(&request, Role::Player)?;
    Ok(next.run(request).await)
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn security_headers_layer() -> tower_http::set_header::SetResponseHeaderLayer<axum::http::HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::overriding(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        axum::http::HeaderValue::from_static("nosniff"),
    )
}

/// Upper bound on distinct clients tracked at once
pub const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Sliding-window limiter for login attempts, keyed by client address
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
    max_clients: usize,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
            max_clients: MAX_TRACKED_CLIENTS,
            trust_proxy_headers: false,
        }
    }

    /// Take the client address from `X-Forwarded-For`/`X-Real-IP` when present
    pub fn with_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        // A poisoned lock only means another request panicked mid-update
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = self.window;
        let expired = |times: &mut Vec<Instant>| times.retain(|&time| now.duration_since(time) < window);

        if !requests.contains_key(key) && requests.len() >= self.max_clients {
            requests.retain(|_, times| {
                expired(times);
                !times.is_empty()
            });
            if requests.len() >= self.max_clients {
                return false;
            }
        }

        let entry = requests.entry(key.to_string()).or_default();
        expired(entry);
        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }
}

/// Rate-limit key for a request. Forwarded headers are only honoured when trusted.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    let forwarded = trust_proxy_headers
        .then(|| {
            headers
                .get("x-forwarded-for")
                .or_else(|| headers.get("x-real-ip"))
                .and_then(|header| header.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .flatten();

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn login_rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_key(request.headers(), peer, rate_limiter.trust_proxy_headers);

    if !rate_limiter.check_rate_limit(&key) {
        tracing::warn!(client = %key, "login rate limit exceeded");
        return Err(AuthError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(!limiter.check_rate_limit("client1"));

        assert!(limiter.check_rate_limit("client2"));
    }

    #[test]
    fn test_rate_limiter_window_slides() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("client", start));
        assert!(!limiter.check_at("client", start + Duration::from_secs(30)));
        assert!(limiter.check_at("client", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_client_key_ignores_forwarded_header_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), false), "127.0.0.1");
        assert_eq!(client_key(&headers, None, false), "unknown");
    }

    #[test]
    fn test_client_key_uses_forwarded_header_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "127.0.0.1");
        assert_eq!(client_key(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn test_rate_limiter_caps_tracked_clients() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60)).with_max_clients(2);
        let start = Instant::now();

        assert!(limiter.check_at("a", start));
        assert!(limiter.check_at("b", start));
        assert!(!limiter.check_at("c", start));
        // Known clients keep their own budget while the table is full
        assert!(limiter.check_at("a", start));

        // Expired entries free their slots
        assert!(limiter.check_at("c", start + Duration::from_secs(61)));
    }
}
