use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

use crate::error::GatewayError;
use crate::metrics::{STUDY_REQUESTS, STUDY_UPSTREAM_LATENCY};
use crate::state::AppState;
use crate::study::{FrameworkSummary, StudyFramework};

pub async fn list_frameworks_handler() -> Json<Vec<FrameworkSummary>> {
    Json(StudyFramework::ALL.into_iter().map(StudyFramework::summary).collect())
}

/// Prepend the framework's system prompt to the chat messages and relay the
/// request to the chat endpoint, streaming its answer back.
pub async fn study_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let framework: StudyFramework = slug.parse()?;

    match forward(&state, framework, &body).await {
        Ok(response) => {
            STUDY_REQUESTS.with_label_values(&[framework.slug(), "ok"]).inc();
            Ok(response)
        }
        Err(e) => {
            STUDY_REQUESTS.with_label_values(&[framework.slug(), "error"]).inc();
            tracing::error!(framework = framework.slug(), error = %e, "{} API error", framework);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to process {} request", framework) })),
            )
                .into_response())
        }
    }
}

async fn forward(state: &AppState, framework: StudyFramework, body: &[u8]) -> Result<Response, GatewayError> {
    let payload = build_chat_body(framework, body, &state.default_model)?;

    let start_time = Instant::now();
    let upstream = state.client.post(&state.chat_url).json(&payload).send().await?;
    STUDY_UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    let status = upstream.status();
    if !status.is_success() {
        return Err(GatewayError::UpstreamStatus(status));
    }
    tracing::debug!(framework = framework.slug(), %status, "relaying chat stream");

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(response)
}

/// Rewrite a client chat body for `framework`: the system prompt goes in
/// front of `messages`, a missing `model` gets `default_model`, every other
/// field is passed through.
pub fn build_chat_body(framework: StudyFramework, body: &[u8], default_model: &str) -> Result<Value, GatewayError> {
    let mut payload: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
    let object = payload
        .as_object_mut()
        .ok_or_else(|| GatewayError::InvalidBody("expected a JSON object".to_string()))?;

    let messages = match object.remove("messages") {
        Some(Value::Array(messages)) => messages,
        _ => return Err(GatewayError::InvalidBody("messages must be an array".to_string())),
    };

    let mut with_prompt = Vec::with_capacity(messages.len() + 1);
    with_prompt.push(json!({ "role": "system", "content": framework.system_prompt() }));
    with_prompt.extend(messages);
    object.insert("messages".to_string(), Value::Array(with_prompt));

    if object.get("model").is_none_or(Value::is_null) {
        object.insert("model".to_string(), Value::String(default_model.to_string()));
    }
    Ok(payload)
}
