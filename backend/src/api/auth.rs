//! Auth API endpoints
//!
//! Simulated login against the local user registry. Logging in opens the
//! user's session workspace; logging out closes it.

use crate::api::utils::{validate_field, RouterState, MAX_PROFILE_FIELD_LENGTH};
use crate::chat::models::SessionSummary;
use crate::error::AppError;
use crate::store::UserProfile;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Display name; derived from the email when empty
    #[serde(default)]
    pub name: String,
    /// Email, matched case-insensitively
    pub email: String,
}

/// Logged-in user with their sessions
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// The user
    pub user: UserProfile,
    /// Their non-deleted sessions
    pub sessions: Vec<SessionSummary>,
    /// Active session id
    pub active_session_id: String,
}

/// POST /api/auth/login - Find-or-create a user and open their workspace
pub async fn login(
    State(state): State<RouterState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = validate_field("Email", &request.email, MAX_PROFILE_FIELD_LENGTH)?;
    if !email.contains('@') {
        return Err(AppError::InvalidInput("Email must contain '@'".to_string()));
    }
    let name = request.name.trim();
    if name.chars().count() > MAX_PROFILE_FIELD_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Name exceeds maximum length of {} characters",
            MAX_PROFILE_FIELD_LENGTH
        )));
    }

    let user = state.profiles.login(name, email).await?;
    let workspace = state.open_workspace(&user).await?;
    let sessions = workspace.sessions().lock().await;

    Ok(Json(LoginResponse {
        sessions: sessions.list(),
        active_session_id: sessions.active_id().to_string(),
        user,
    }))
}

/// POST /api/auth/logout - Clear the current user and close the workspace
pub async fn logout(State(state): State<RouterState>) -> Result<Json<serde_json::Value>, AppError> {
    state.profiles.logout().await?;
    state.close_workspace().await;
    Ok(Json(serde_json::json!({
        "message": "Logged out"
    })))
}

/// GET /api/auth/me - The current user
pub async fn me(State(state): State<RouterState>) -> Result<Json<UserProfile>, AppError> {
    state
        .profiles
        .current_user()
        .await?
        .map(Json)
        .ok_or(AppError::NotLoggedIn)
}
