//! Streaming utilities for Server-Sent Events (SSE)
//!
//! Turns the event channel of a running turn into an SSE response.

use crate::error::AppError;
use crate::orchestrator::constants::{SSE_DONE_SIGNAL, SSE_ERROR_PREFIX};
use crate::orchestrator::{TurnEvent, TurnOutcome};
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use futures_util::{stream::Stream, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Create an SSE response from a turn's events
///
/// # Arguments
/// * `events` - Receiver of the turn's event sink
/// * `turn` - The spawned turn; its result closes the stream
///
/// # Returns
/// * `Result<Response, AppError>` - SSE HTTP response or error
pub fn create_sse_stream(
    events: UnboundedReceiver<TurnEvent>,
    turn: JoinHandle<Result<TurnOutcome, AppError>>,
) -> Result<Response, AppError> {
    let sse_stream = create_stream(events, turn).map(|event_result| {
        let sse_text = match event_result {
            Ok(data) => format!("data: {}\n\n", data),
            Err(e) => format!("data: {} {}\n\n", SSE_ERROR_PREFIX, e),
        };
        Ok::<_, std::io::Error>(sse_text)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(sse_stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build SSE response: {}", e)))
}

/// Serialized events, then `[DONE]` or an error once the turn ends
///
/// The channel closes when the turn drops its sink, i.e. when it finishes.
fn create_stream(
    events: UnboundedReceiver<TurnEvent>,
    turn: JoinHandle<Result<TurnOutcome, AppError>>,
) -> impl Stream<Item = Result<String, String>> {
    use async_stream::stream;

    let mut events = UnboundedReceiverStream::new(events);

    stream! {
        while let Some(event) = events.next().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(json),
                Err(e) => yield Err(format!("Failed to serialize event: {}", e)),
            }
        }

        match turn.await {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    session_id = %outcome.session_id,
                    replies = outcome.reply_ids.len(),
                    cancelled = outcome.cancelled,
                    "Turn stream finished"
                );
                yield Ok(SSE_DONE_SIGNAL.to_string());
            }
            Ok(Err(e)) => yield Err(e.to_string()),
            Err(e) => {
                tracing::error!(error = %e, "Turn task failed");
                yield Err(format!("Turn task failed: {}", e));
            }
        }
    }
}
