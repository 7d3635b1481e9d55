//! Session API endpoints
//!
//! Listing, creation, selection, renaming, soft deletion and module
//! switching for the logged-in user's sessions.

use crate::api::utils::{validate_field, RouterState};
use crate::chat::models::{Module, Session, SessionSummary};
use crate::error::AppError;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

/// Maximum session title length in characters
pub const MAX_TITLE_LENGTH: usize = 120;

/// Session listing
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// Non-deleted sessions, newest created first
    pub sessions: Vec<SessionSummary>,
    /// Active session id
    pub active_session_id: String,
}

/// Request to rename a session
#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    /// New title
    pub title: String,
}

/// Request to switch the active session's module
#[derive(Debug, Deserialize)]
pub struct SetModuleRequest {
    /// Module to route input to
    pub module: Module,
}

async fn listing(state: &RouterState) -> Result<SessionsResponse, AppError> {
    let workspace = state.workspace().await?;
    let sessions = workspace.sessions().lock().await;
    Ok(SessionsResponse {
        sessions: sessions.list(),
        active_session_id: sessions.active_id().to_string(),
    })
}

/// GET /api/sessions - List sessions
pub async fn list_sessions(State(state): State<RouterState>) -> Result<Json<SessionsResponse>, AppError> {
    Ok(Json(listing(&state).await?))
}

/// POST /api/sessions - Create a session and make it active
pub async fn create_session(State(state): State<RouterState>) -> Result<Json<SessionSummary>, AppError> {
    let workspace = state.workspace().await?;
    let summary = workspace.sessions().lock().await.create().await?;
    Ok(Json(summary))
}

/// GET /api/sessions/:id - Session with messages
pub async fn get_session(
    State(state): State<RouterState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, AppError> {
    let workspace = state.workspace().await?;
    let sessions = workspace.sessions().lock().await;
    sessions
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(AppError::SessionNotFound(id))
}

/// POST /api/sessions/:id/select - Make a session active
pub async fn select_session(
    State(state): State<RouterState>,
    Path(id): Path<String>,
) -> Result<Json<SessionsResponse>, AppError> {
    state.workspace().await?.sessions().lock().await.select(&id).await?;
    Ok(Json(listing(&state).await?))
}

/// PUT /api/sessions/:id/title - Rename a session
pub async fn rename_session(
    State(state): State<RouterState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTitleRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    let title = validate_field("Title", &request.title, MAX_TITLE_LENGTH)?;
    let workspace = state.workspace().await?;
    let mut sessions = workspace.sessions().lock().await;
    sessions.rename(&id, title).await?;
    sessions
        .get(&id)
        .map(|s| Json(SessionSummary::from(s)))
        .ok_or(AppError::SessionNotFound(id))
}

/// DELETE /api/sessions/:id - Soft-delete a session
pub async fn delete_session(
    State(state): State<RouterState>,
    Path(id): Path<String>,
) -> Result<Json<SessionsResponse>, AppError> {
    state.workspace().await?.sessions().lock().await.delete(&id).await?;
    Ok(Json(listing(&state).await?))
}

/// POST /api/sessions/clear - Soft-delete every session and start fresh
pub async fn clear_sessions(State(state): State<RouterState>) -> Result<Json<SessionsResponse>, AppError> {
    state.workspace().await?.sessions().lock().await.clear_all().await?;
    Ok(Json(listing(&state).await?))
}

/// PUT /api/sessions/active/module - Switch the active session's module
pub async fn set_active_module(
    State(state): State<RouterState>,
    Json(request): Json<SetModuleRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    let workspace = state.workspace().await?;
    let mut sessions = workspace.sessions().lock().await;
    sessions.set_module(request.module).await?;
    Ok(Json(SessionSummary::from(sessions.active()?)))
}
