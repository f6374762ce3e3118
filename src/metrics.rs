use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref API_REQUESTS: Counter =
        register_counter!("openbook_api_requests_total", "Total number of /api requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("openbook_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref RATE_LIMIT_BUCKETS: Gauge =
        register_gauge!("openbook_rate_limit_buckets", "Current number of rate limit buckets").unwrap();
    pub static ref STUDY_REQUESTS: CounterVec = register_counter_vec!(
        "openbook_study_requests_total",
        "Study mode requests by framework and outcome",
        &["framework", "outcome"]
    )
    .unwrap();
    pub static ref STUDY_UPSTREAM_LATENCY: Histogram = register_histogram!(
        "openbook_study_upstream_latency_seconds",
        "Time until the chat endpoint answered a study mode request"
    )
    .unwrap();
}

// Text exposition of everything registered above
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
