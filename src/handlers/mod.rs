mod health;
mod metrics;
mod study;

pub use health::{health_handler, not_found_handler};
pub use metrics::metrics_handler;
pub use study::{build_chat_body, list_frameworks_handler, study_handler};
