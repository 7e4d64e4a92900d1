//! Process-local rate limiting for the public auth routes.
//!
//! A fixed-window counter keyed by client IP, held in a process-wide map.
//! Single-process only: counters are neither shared across instances nor
//! persisted. Not a production rate limiter.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::CONFIG;

struct Window {
    started: Instant,
    count: u32,
}

static WINDOWS: Lazy<Mutex<HashMap<String, Window>>> = Lazy::new(|| Mutex::new(HashMap::new()));

// Entries are pruned once the map grows past this, to bound memory
const PRUNE_THRESHOLD: usize = 10_000;

/// Rate-limit middleware for unauthenticated routes
pub async fn rate_limit(req: Request, next: Next) -> Response {
    let key = client_key(&req);
    let window = Duration::from_secs(CONFIG.auth.rate_limit_window_secs);
    let max = CONFIG.auth.rate_limit_max_requests;

    if !check_rate_limit(&key, Instant::now(), window, max) {
        tracing::debug!(client = %key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "detail": "Too many requests, slow down"
            })),
        )
            .into_response();
    }

    next.run(req).await
}

/// Record a hit for `key` and report whether it is still within the window
/// budget. Extracted from the middleware for testability.
fn check_rate_limit(key: &str, now: Instant, window: Duration, max: u32) -> bool {
    let mut map = WINDOWS.lock();

    if map.len() > PRUNE_THRESHOLD {
        map.retain(|_, w| now.duration_since(w.started) < window);
    }

    let entry = map.entry(key.to_string()).or_insert(Window {
        started: now,
        count: 0,
    });

    if now.duration_since(entry.started) >= window {
        entry.started = now;
        entry.count = 0;
    }

    entry.count += 1;
    entry.count <= max
}

/// Best-effort client identity: X-Forwarded-For first, then the peer address
fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_enforced_within_window() {
        let window = Duration::from_secs(60);
        let now = Instant::now();
        let key = "test_budget_enforced";

        for _ in 0..5 {
            assert!(check_rate_limit(key, now, window, 5));
        }
        assert!(!check_rate_limit(key, now, window, 5));
    }

    #[test]
    fn test_window_resets() {
        let window = Duration::from_millis(10);
        let start = Instant::now();
        let key = "test_window_resets";

        assert!(check_rate_limit(key, start, window, 1));
        assert!(!check_rate_limit(key, start, window, 1));

        let later = start + Duration::from_millis(20);
        assert!(check_rate_limit(key, later, window, 1));
    }

    #[test]
    fn test_keys_are_independent() {
        let window = Duration::from_secs(60);
        let now = Instant::now();

        assert!(check_rate_limit("test_independent_a", now, window, 1));
        assert!(check_rate_limit("test_independent_b", now, window, 1));
        assert!(!check_rate_limit("test_independent_a", now, window, 1));
    }
}
