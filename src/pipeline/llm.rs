//! Model invocation: one request, one reply, no retries.
//!
//! Transport failures, throttling and credential errors propagate unchanged
//! as [`DocTagError::ModelCallFailed`]; retry policy belongs to the caller.
//! The only thing added here is an optional deadline.

use crate::error::DocTagError;
use crate::model::{ConverseReply, ConverseRequest, ModelClient};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Send `request` to the model, failing with [`DocTagError::ModelTimeout`]
/// if `timeout_secs` elapses first.
pub async fn invoke(
    client: &dyn ModelClient,
    request: &ConverseRequest,
    timeout_secs: Option<u64>,
) -> Result<ConverseReply, DocTagError> {
    let start = Instant::now();
    debug!(
        "Calling model {} with {} bytes of images",
        client.model_id(),
        request.image_bytes()
    );

    let reply = match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), client.converse(request))
            .await
            .map_err(|_| DocTagError::ModelTimeout { secs })??,
        None => client.converse(request).await?,
    };

    info!(
        "Model {}: {} input tokens, {} output tokens, stop reason {:?}, {:?}",
        client.model_id(),
        reply.usage.input_tokens,
        reply.usage.output_tokens,
        reply.stop_reason,
        start.elapsed()
    );
    Ok(reply)
}
