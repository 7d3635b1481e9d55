//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// Backend failures inside a turn are turned into message content by the
/// orchestrator; only validation, lookup and storage failures reach here.
#[derive(Error, Debug)]
pub enum AppError {
    /// No user is logged in
    #[error("Not logged in")]
    NotLoggedIn,

    /// Session with the given ID was not found (or is deleted)
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Message with the given ID was not found
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Request input failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error occurred in the profile store
    #[error("Storage error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// A backend call failed outside of a turn
    #[error("Backend error: {0}")]
    Backend(#[from] crate::services::BackendError),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::MessageNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
