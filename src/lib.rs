pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
pub mod state;
pub mod storage;
pub mod streak;
pub mod study;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

// /health and /metrics sit outside the rate limited /api tree
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/study", get(handlers::list_frameworks_handler))
        .route("/study/{framework}", post(handlers::study_handler))
        // unrouted /api paths still go through the limiter
        .fallback(handlers::not_found_handler)
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::rate_limit,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api", api)
        .with_state(state)
}
