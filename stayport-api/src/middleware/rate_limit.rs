use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use stayport_store::rate_limit::API_POLICY;

use crate::error::AppError;
use crate::state::AppState;

/// Best-effort client address derivation through the usual proxy headers.
/// Clients behind unrecognized proxies share the "unknown" bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(ip) = headers.get("cf-connecting-ip").and_then(|h| h.to_str().ok()) {
        return ip.to_string();
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        return ip.to_string();
    }

    "unknown".to_string()
}

/// Blanket per-address throttle over the whole surface. The auth endpoint
/// layers its stricter policy on top inside the handler.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(req.headers());
    let decision = state.limiter.check(&ip, &API_POLICY).await;

    if decision.allowed {
        Ok(next.run(req).await)
    } else {
        Err(AppError::RateLimited {
            reset_at: decision.reset_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn test_header_fallback_chain() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_ip(&headers), "198.51.100.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.4"));
        assert_eq!(client_ip(&headers), "192.0.2.4");
    }

    #[test]
    fn test_unknown_bucket() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
