pub mod auth;
pub mod health;
pub mod user;

use axum::http::HeaderMap;

/// Best-effort client IP for the refresh-token audit fields: first value of
/// `X-Forwarded-For`, then `X-Real-IP`. Absent headers yield `None`; the
/// flows treat the IP as optional metadata, never as an authentication
/// factor.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
