use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::{API_REQUESTS, RATE_LIMIT_BUCKETS, RATE_LIMITED};
use crate::rate_limit::{Decision, RateLimitStore};
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// x-forwarded-for (first hop), then x-real-ip, otherwise everyone shares "unknown"
pub fn client_ip(headers: &HeaderMap) -> String {
    // empty headers count as absent
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(first) = forwarded {
        return first.to_string();
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(real_ip) = real_ip {
        return real_ip.to_string();
    }
    "unknown".to_string()
}

fn set_quota_headers(headers: &mut HeaderMap, decision: &Decision, remaining: u64) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_secs));
}

fn log_request(ip: &str, user_agent: &str, path: &str, status: StatusCode, started: Instant, remaining: u64) {
    tracing::info!(
        target: "api_request",
        timestamp = %chrono::Utc::now().to_rfc3339(),
        ip,
        user_agent,
        path,
        status = status.as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        rate_limit_remaining = remaining,
        "api request"
    );
}

/// Fixed-window rate limiting for everything under `/api`.
pub async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    API_REQUESTS.inc();

    let ip = client_ip(request.headers());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let path = request.uri().path().to_string();

    let decision = state.rate_limiter.check(&ip);
    RATE_LIMIT_BUCKETS.set(state.rate_limiter.store().len() as f64);

    if !decision.allowed {
        RATE_LIMITED.inc();
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "Too many requests" })),
        )
            .into_response();
        let headers = response.headers_mut();
        set_quota_headers(headers, &decision, 0);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));

        log_request(&ip, &user_agent, &path, StatusCode::TOO_MANY_REQUESTS, started, decision.remaining);
        return response;
    }

    let mut response = next.run(request).await;
    set_quota_headers(response.headers_mut(), &decision, decision.remaining);

    log_request(&ip, &user_agent, &path, response.status(), started, decision.remaining);
    response
}
