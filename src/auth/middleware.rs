use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, header::USER_AGENT, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{extract_bearer_token, AuthError, AuthService, UserRole, UserSession};
use crate::models::RequestOrigin;

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

    request.extensions_mut().insert(session.clone());

    // Echoed on the response for the outer error-recording layer.
    let mut response = next.run(request).await;
    response.extensions_mut().insert(session);
    Ok(response)
}

fn session_of(request: &Request) -> Result<&UserSession, AuthError> {
    request
        .extensions()
        .get::<UserSession>()
        .ok_or(AuthError::InsufficientPermissions)
}

/// Business routes: owners, and platform admins.
pub async fn owner_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let session = session_of(&request)?;
    if !session.role.can_access(&UserRole::Owner) {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(next.run(request).await)
}

/// Admin-only middleware
pub async fn admin_only_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let session = session_of(&request)?;
    if session.role != UserRole::Admin {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(next.run(request).await)
}

/// Public customer routes.
pub async fn client_session_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let session = session_of(&request)?;
    if session.role != UserRole::Client {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(next.run(request).await)
}

/// Caller address and agent, for audit entries.
pub fn request_origin(headers: &HeaderMap) -> RequestOrigin {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    RequestOrigin {
        ip_address: header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header("x-real-ip")),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

/// CORS configuration. Bearer tokens travel in headers, so no credentials mode.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Security headers middleware
pub fn security_headers_layer() -> tower_http::set_header::SetResponseHeaderLayer<axum::http::HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::overriding(
        axum::http::header::HeaderName::from_static("x-content-type-options"),
        axum::http::HeaderValue::from_static("nosniff"),
    )
}

/// Sliding-window in-memory rate limiter keyed by client address.
///
/// Forwarded-for headers are only honoured when the service runs behind a
/// proxy that sets them; otherwise the socket peer address is the key.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
            trust_proxy_headers: false,
        }
    }

    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.window);
            !times.is_empty()
        });

        let entry = requests.entry(key.to_string()).or_default();
        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }

    /// Number of callers currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn client_key(&self, request: &Request) -> String {
        if self.trust_proxy_headers {
            if let Some(ip) = request_origin(request.headers()).ip_address {
                return ip;
            }
        }
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Rejects callers that exceed the limiter's budget.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client_ip = rate_limiter.client_key(&request);

    if !rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!(client_ip = %client_ip, "rate limit exceeded");
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
    fn test_user_role_permissions() {
        let admin = UserRole::Admin;
        let owner = UserRole::Owner;
        let client = UserRole::Client;

        assert!(admin.can_access(&admin));
        assert!(admin.can_access(&owner));
        assert!(admin.can_access(&client));

        assert!(owner.can_access(&owner));
        assert!(!owner.can_access(&client));
        assert!(!owner.can_access(&admin));

        assert!(client.can_access(&client));
        assert!(!client.can_access(&owner));
    }

    #[test]
    fn origin_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 172.16.0.1"));
        headers.insert(USER_AGENT, HeaderValue::from_static("test-agent"));

        let origin = request_origin(&headers);
        assert_eq!(origin.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(origin.user_agent.as_deref(), Some("test-agent"));

        let empty = request_origin(&HeaderMap::new());
        assert!(empty.ip_address.is_none());
    }

    fn forwarded_request(forwarded_for: &str, peer: SocketAddr) -> Request {
        let mut request = axum::http::Request::builder()
            .header("x-forwarded-for", forwarded_for)
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn forwarded_header_is_ignored_without_a_trusted_proxy() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let peer: SocketAddr = "203.0.113.7:50123".parse().unwrap();

        assert_eq!(limiter.client_key(&forwarded_request("10.0.0.1", peer)), "203.0.113.7");
        assert_eq!(limiter.client_key(&forwarded_request("10.0.0.2", peer)), "203.0.113.7");

        let behind_proxy = limiter.trusting_proxy_headers(true);
        assert_eq!(behind_proxy.client_key(&forwarded_request("10.0.0.1", peer)), "10.0.0.1");
    }

    #[test]
    fn idle_callers_are_forgotten() {
        let limiter = RateLimiter::new(3, Duration::from_millis(20));
        for i in 0..50 {
            assert!(limiter.check_rate_limit(&format!("198.51.100.{i}")));
        }
        assert_eq!(limiter.tracked_clients(), 50);

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit("198.51.100.200"));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
