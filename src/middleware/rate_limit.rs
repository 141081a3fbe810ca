use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::time::Instant;

use crate::{services::metrics::RATE_LIMITED, AppState};

/// Windows are swept once the table grows past this many keys.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    count: u64,
    expires_at: Instant,
}

/// In-process fixed-window counters, one per key.
///
/// Mirrors the INCR + EXPIRE strategy: the first hit in a window starts
/// the clock, later hits only increment, so a steady stream of requests
/// does not keep pushing the reset further out.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one hit against `key` and returns the count in the current window.
    pub fn hit(&self, key: &str, window: Duration) -> u64 {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| w.expires_at > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;
        entry.count
    }
}

/// Counts a hit for `key` and returns 429 if the window already holds
/// more than `max_attempts`.
pub fn check_rate_limit(
    limiter: &RateLimiter,
    tier: &str,
    key: &str,
    max_attempts: u64,
    window_secs: u64,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let count = limiter.hit(key, Duration::from_secs(window_secs));

    if count > max_attempts {
        RATE_LIMITED.with_label_values(&[tier]).inc();
        tracing::warn!(target: "security", event = "RATE_LIMITED", tier, key, count);
        let message = match tier {
            "admin" => "Too many admin actions, please slow down.",
            _ => "Too many requests from this IP, please try again later.",
        };
        return Err((StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": message }))));
    }

    Ok(())
}

/// Extracts the real client IP from proxy headers.
/// Priority: X-Real-IP → first X-Forwarded-For.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }
    "unknown".to_string()
}

/// General-tier limit applied to every API route.
pub async fn general_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = format!("rate:general:ip:{}", client_ip(request.headers()));
    if let Err(rejection) = check_rate_limit(
        &state.general_limiter,
        "general",
        &key,
        state.config.general_rate_limit,
        state.config.rate_limit_window_secs,
    ) {
        return rejection.into_response();
    }
    next.run(request).await
}
