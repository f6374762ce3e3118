use crate::error::GatewayError;

pub async fn metrics_handler() -> Result<String, GatewayError> {
    Ok(crate::metrics::render()?)
}
