use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("chat request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("chat API responded with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("unknown study framework: {0}")]
    UnknownFramework(String),

    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::UnknownFramework(_) => {
                (StatusCode::NOT_FOUND, "Unknown study framework".to_string())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
