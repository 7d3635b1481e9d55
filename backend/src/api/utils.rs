//! API state and shared helpers
//!
//! Holds the collaborators every handler needs and the workspace of the
//! logged-in user (their session manager wrapped in an orchestrator).

use crate::chat::manager::SessionManager;
use crate::error::AppError;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::services::{DocumentConverter, GenerativeBackend};
use crate::store::{ProfileStore, UserProfile};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Maximum length of a name or email at login
pub const MAX_PROFILE_FIELD_LENGTH: usize = 200;

/// Shared application state
pub struct AppState {
    /// User registry and session persistence
    pub profiles: ProfileStore,
    /// Generative backend
    pub backend: Arc<dyn GenerativeBackend>,
    /// Conversion service, when configured
    pub converter: Option<Arc<dyn DocumentConverter>>,
    /// Runtime-updatable orchestrator settings
    pub config: Arc<RwLock<OrchestratorConfig>>,
    workspace: RwLock<Option<Arc<Orchestrator>>>,
}

/// State handed to every handler
pub type RouterState = Arc<AppState>;

impl AppState {
    /// Create state with no user logged in
    pub fn new(
        profiles: ProfileStore,
        backend: Arc<dyn GenerativeBackend>,
        converter: Option<Arc<dyn DocumentConverter>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            profiles,
            backend,
            converter,
            config: Arc::new(RwLock::new(config)),
            workspace: RwLock::new(None),
        }
    }

    /// Open the workspace of `user`
    ///
    /// The open workspace is kept when it already belongs to `user`. Any
    /// other one is closed, so its running turns can no longer write over the
    /// sessions it shared the store with.
    pub async fn open_workspace(&self, user: &UserProfile) -> Result<Arc<Orchestrator>, AppError> {
        let mut workspace = self.workspace.write().await;
        if let Some(open) = workspace.as_ref() {
            if open.sessions().lock().await.user_id() == user.id {
                tracing::debug!(user_id = %user.id, "Workspace already open");
                return Ok(Arc::clone(open));
            }
        }

        let sessions = SessionManager::open(self.profiles.clone(), &user.id).await?;
        let orchestrator = Arc::new(Orchestrator::new(
            sessions,
            Arc::clone(&self.backend),
            self.converter.clone(),
            Arc::clone(&self.config),
        ));
        if let Some(previous) = workspace.replace(Arc::clone(&orchestrator)) {
            previous.close().await;
        }
        tracing::info!(user_id = %user.id, "Opened workspace");
        Ok(orchestrator)
    }

    /// Reopen the workspace of the stored current user, if any
    pub async fn restore_workspace(&self) -> Result<Option<UserProfile>, AppError> {
        let Some(user) = self.profiles.current_user().await? else {
            return Ok(None);
        };
        self.open_workspace(&user).await?;
        Ok(Some(user))
    }

    /// Close and drop the open workspace
    pub async fn close_workspace(&self) {
        if let Some(previous) = self.workspace.write().await.take() {
            previous.close().await;
        }
    }

    /// The logged-in user's workspace
    pub async fn workspace(&self) -> Result<Arc<Orchestrator>, AppError> {
        self.workspace
            .read()
            .await
            .clone()
            .ok_or(AppError::NotLoggedIn)
    }
}

/// Validate a required text field
///
/// # Returns
/// * The trimmed value
pub fn validate_field<'a>(field: &str, value: &'a str, max_len: usize) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::InvalidInput(format!(
            "{} exceeds maximum length of {} characters",
            field, max_len
        )));
    }
    Ok(trimmed)
}
