//! Chat API endpoints
//!
//! Runs one turn in the active session and streams its events back.

use crate::api::streaming::create_sse_stream;
use crate::api::utils::RouterState;
use crate::error::AppError;
use crate::orchestrator::{EventSink, TurnInput};
use axum::{extract::State, response::Json, response::Response};

/// POST /api/chat/send - Run one turn, streaming turn events over SSE
///
/// Invalid input is rejected before the stream starts. The turn runs in its
/// own task, so a client disconnect does not stop it from completing.
pub async fn send_message(
    State(state): State<RouterState>,
    Json(input): Json<TurnInput>,
) -> Result<Response, AppError> {
    let workspace = state.workspace().await?;
    workspace.validate_input(&input).await?;

    let (sink, events) = EventSink::channel();
    let turn = tokio::spawn(async move { workspace.send(input, &sink).await });

    create_sse_stream(events, turn)
}
