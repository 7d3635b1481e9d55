//! Message API endpoints
//!
//! Reactions, feedback and read-aloud for individual messages.

use crate::api::utils::RouterState;
use crate::chat::context::Utterance;
use crate::chat::models::Reaction;
use crate::error::AppError;
use crate::orchestrator::SpokenMessage;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

/// Maximum feedback length in characters
pub const MAX_FEEDBACK_LENGTH: usize = 2_000;

/// Request to react to a message
#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    /// Reaction to set; repeating the current one clears it
    pub reaction: Reaction,
}

/// Reaction after the update
#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    /// Message id
    pub message_id: String,
    /// Current reaction, `None` when cleared
    pub reaction: Option<Reaction>,
}

/// Request to leave feedback on a message
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// Free text; blank clears the feedback
    pub feedback: String,
}

/// Result of stopping playback
#[derive(Debug, Serialize)]
pub struct StopSpeakingResponse {
    /// Utterance that was stopped
    pub stopped: Option<Utterance>,
}

/// PUT /api/messages/:id/reaction - Set or toggle a reaction
pub async fn set_reaction(
    State(state): State<RouterState>,
    Path(id): Path<String>,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<ReactionResponse>, AppError> {
    let workspace = state.workspace().await?;
    let reaction = workspace
        .sessions()
        .lock()
        .await
        .set_reaction(&id, request.reaction)
        .await?;
    Ok(Json(ReactionResponse {
        message_id: id,
        reaction,
    }))
}

/// PUT /api/messages/:id/feedback - Store feedback text
pub async fn set_feedback(
    State(state): State<RouterState>,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.feedback.chars().count() > MAX_FEEDBACK_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Feedback exceeds maximum length of {} characters",
            MAX_FEEDBACK_LENGTH
        )));
    }
    let workspace = state.workspace().await?;
    workspace
        .sessions()
        .lock()
        .await
        .set_feedback(&id, &request.feedback)
        .await?;
    Ok(Json(serde_json::json!({
        "message": "Feedback saved",
        "id": id
    })))
}

/// POST /api/messages/:id/speak - Read a message aloud
pub async fn speak_message(
    State(state): State<RouterState>,
    Path(id): Path<String>,
) -> Result<Json<SpokenMessage>, AppError> {
    let workspace = state.workspace().await?;
    Ok(Json(workspace.speak(&id).await?))
}

/// POST /api/speech/stop - Stop the current utterance
pub async fn stop_speaking(State(state): State<RouterState>) -> Result<Json<StopSpeakingResponse>, AppError> {
    let workspace = state.workspace().await?;
    Ok(Json(StopSpeakingResponse {
        stopped: workspace.stop_speaking().await,
    }))
}
