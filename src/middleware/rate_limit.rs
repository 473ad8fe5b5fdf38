//! Fixed-window rate limiting keyed by client IP and matched route.
//!
//! State lives in process memory, so limits are per instance. Running several
//! instances behind a load balancer multiplies the effective limit.

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use crate::{config::RateLimitConfig, errors::AppError, AppState};

/// Stricter limit for a family of routes.
#[derive(Debug, Clone)]
pub struct RouteLimit {
    pub method: Method,
    pub path_prefix: &'static str,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    windows: DashMap<(String, String), Window>,
    max_requests: u32,
    window: Duration,
    route_limits: Vec<RouteLimit>,
    trust_proxy_headers: bool,
}

/// Window key for requests that matched no route.
const UNMATCHED_ROUTE: &str = "<unmatched>";

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
            route_limits: Vec::new(),
            trust_proxy_headers: false,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
            .trusting_proxy_headers(config.trust_proxy_headers)
            // Readings call the interpretation provider, keep them scarce
            .with_route_limit(Method::POST, "/api/readings", 10)
            .with_route_limit(Method::POST, "/api/referrals/redeem", 5)
    }

    pub fn with_route_limit(mut self, method: Method, path_prefix: &'static str, max_requests: u32) -> Self {
        self.route_limits.push(RouteLimit {
            method,
            path_prefix,
            max_requests,
        });
        self
    }

    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Client address used as the window key. Forwarding headers only count when trusted.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_proxy_headers {
            extract_client_ip(headers, peer)
        } else {
            peer_ip(peer)
        }
    }

    fn limit_for(&self, method: &Method, path: &str) -> u32 {
        self.route_limits
            .iter()
            .find(|rule| rule.method == *method && path.starts_with(rule.path_prefix))
            .map(|rule| rule.max_requests)
            .unwrap_or(self.max_requests)
    }

    /// Count one request from `client` on `path` at `now`.
    pub fn check(&self, client: &str, method: &Method, path: &str, now: Instant) -> Decision {
        let limit = self.limit_for(method, path);
        let mut entry = self
            .windows
            .entry((client.to_string(), path.to_string()))
            .or_insert(Window {
                count: 0,
                started_at: now,
            });

        if now.duration_since(entry.started_at) >= self.window {
            entry.count = 0;
            entry.started_at = now;
        }

        if entry.count >= limit {
            let elapsed = now.duration_since(entry.started_at);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: limit - entry.count,
        }
    }

    /// Drop windows that have already elapsed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started_at) < self.window);
        before - self.windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = state.rate_limiter.client_key(request.headers(), peer);
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    match state
        .rate_limiter
        .check(&client, request.method(), &path, Instant::now())
    {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %client, path = %path, "Rate limit exceeded");
            AppError::TooManyRequests {
                retry_after_secs: retry_after.as_secs().max(1),
            }
            .into_response()
        }
    }
}

pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    // Check for common proxy headers
    if let Some(forwarded_for) = headers.get("X-Forwarded-For") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            // Take the first IP in the chain
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return first_ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("X-Real-IP") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            return real_ip_str.trim().to_string();
        }
    }

    if let Some(forwarded) = headers.get("Forwarded") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // RFC 7239
            for pair in forwarded_str.split(';').flat_map(|part| part.split(',')) {
                if let Some((key, value)) = pair.split_once('=') {
                    if key.trim().eq_ignore_ascii_case("for") {
                        return value.trim().trim_matches('"').to_string();
                    }
                }
            }
        }
    }

    peer_ip(peer)
}

fn peer_ip(peer: Option<SocketAddr>) -> String {
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blocks_request_after_limit_and_resets_after_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..3 {
            assert_eq!(
                limiter.check("1.2.3.4", &Method::GET, "/api/user/credits", start),
                Decision::Allowed { remaining: 2 - i }
            );
        }
        let blocked = limiter.check(
            "1.2.3.4",
            &Method::GET,
            "/api/user/credits",
            start + Duration::from_secs(10),
        );
        assert_eq!(
            blocked,
            Decision::Limited {
                retry_after: Duration::from_secs(50)
            }
        );

        let after_window = start + Duration::from_secs(60);
        assert_eq!(
            limiter.check("1.2.3.4", &Method::GET, "/api/user/credits", after_window),
            Decision::Allowed { remaining: 2 }
        );
    }

    #[test]
    fn clients_and_paths_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(limiter.check("a", &Method::GET, "/api/x", now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check("a", &Method::GET, "/api/x", now), Decision::Limited { .. }));
        assert!(matches!(limiter.check("b", &Method::GET, "/api/x", now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check("a", &Method::GET, "/api/y", now), Decision::Allowed { .. }));
    }

    #[test]
    fn route_limits_override_default() {
        let limiter = RateLimiter::new(100, Duration::from_secs(60))
            .with_route_limit(Method::POST, "/api/readings", 1);
        let now = Instant::now();

        assert!(matches!(limiter.check("a", &Method::POST, "/api/readings", now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check("a", &Method::POST, "/api/readings", now), Decision::Limited { .. }));
        // Listing readings is not the expensive route
        assert!(matches!(limiter.check("a", &Method::GET, "/api/readings", now), Decision::Allowed { .. }));
    }

    #[test]
    fn sweep_removes_elapsed_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        let now = Instant::now();
        limiter.check("a", &Method::GET, "/", now);
        limiter.check("b", &Method::GET, "/", now);
        assert_eq!(limiter.sweep(now), 0);
        assert_eq!(limiter.sweep(now + Duration::from_secs(2)), 2);
        assert!(limiter.is_empty());
    }

    #[test]
    fn client_ip_prefers_proxy_headers() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, Some(peer)), "10.0.0.1");

        headers.insert("Forwarded", HeaderValue::from_static("for=\"192.0.2.60\";proto=http"));
        assert_eq!(extract_client_ip(&headers, Some(peer)), "192.0.2.60");

        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.7, 10.0.0.2"));
        assert_eq!(extract_client_ip(&headers, Some(peer)), "203.0.113.7");

        assert_eq!(extract_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn forwarding_headers_ignored_unless_trusted() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.7"));

        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.client_key(&headers, Some(peer)), "10.0.0.1");

        let limiter = limiter.trusting_proxy_headers(true);
        assert_eq!(limiter.client_key(&headers, Some(peer)), "203.0.113.7");
    }
}
