//! Session manager
//!
//! Owns one user's session list in memory, tracks the active session and its
//! conversation context, and writes the full list back to the profile store
//! after every mutation.
//!
//! Session and module switches cancel the current turn token so that
//! in-flight generations stop writing into a session the user left.

use crate::chat::context::ConversationContext;
use crate::chat::models::{
    Message, MessageEdit, Module, Reaction, Session, SessionSummary,
};
use crate::error::AppError;
use crate::store::ProfileStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// In-memory session list for one user, synced to the store
pub struct SessionManager {
    store: ProfileStore,
    user_id: String,
    sessions: Vec<Session>,
    active_id: String,
    context: ConversationContext,
    turns: CancellationToken,
    closed: bool,
}

impl SessionManager {
    /// Load a user's sessions and pick the active one.
    ///
    /// Messages left streaming by an interrupted run are settled. When no
    /// live session exists a fresh one is created.
    pub async fn open(store: ProfileStore, user_id: &str) -> Result<Self, AppError> {
        let mut sessions = store.load_sessions(user_id).await?;

        let dangling: usize = sessions.iter_mut().map(Session::settle_dangling).sum();
        if dangling > 0 {
            warn!(user_id = %user_id, dangling, "Settled messages left streaming");
        }

        let mut created = false;
        if !sessions.iter().any(|s| !s.is_deleted) {
            sessions.insert(0, Session::new());
            created = true;
        }

        let active = sessions
            .iter()
            .find(|s| !s.is_deleted)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("No live session available")))?;
        let active_id = active.id.clone();
        let context = ConversationContext::from_session(active);

        let manager = Self {
            store,
            user_id: user_id.to_string(),
            sessions,
            active_id,
            context,
            turns: CancellationToken::new(),
            closed: false,
        };

        if created || dangling > 0 {
            manager.persist().await?;
        }

        info!(
            user_id = %user_id,
            sessions = manager.sessions.len(),
            active = %manager.active_id,
            "Opened session workspace"
        );
        Ok(manager)
    }

    async fn persist(&self) -> Result<(), AppError> {
        if self.closed {
            debug!(user_id = %self.user_id, "Workspace closed, not persisting");
            return Ok(());
        }
        self.store
            .save_sessions(&self.user_id, &self.sessions)
            .await?;
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn live_position(&self, id: &str) -> Result<usize, AppError> {
        self.sessions
            .iter()
            .position(|s| s.id == id && !s.is_deleted)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    fn active_index(&self) -> Result<usize, AppError> {
        self.live_position(&self.active_id)
    }

    /// Cancel every in-flight turn and start a fresh token generation
    fn invalidate_turns(&mut self) {
        self.turns.cancel();
        if !self.closed {
            self.turns = CancellationToken::new();
        }
    }

    fn activate(&mut self, index: usize) {
        self.invalidate_turns();
        self.active_id = self.sessions[index].id.clone();
        self.context = ConversationContext::from_session(&self.sessions[index]);
    }

    /// Retire this manager: cancel in-flight turns for good and stop
    /// writing to the store. Another manager may now own the user's sessions.
    pub fn close(&mut self) {
        self.turns.cancel();
        self.closed = true;
        info!(user_id = %self.user_id, "Closed session workspace");
    }

    /// Whether [`Self::close`] was called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Owner of the sessions
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Non-deleted sessions in storage order (newest created first)
    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .filter(|s| !s.is_deleted)
            .map(SessionSummary::from)
            .collect()
    }

    /// Id of the active session
    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// The active session
    pub fn active(&self) -> Result<&Session, AppError> {
        let index = self.active_index()?;
        Ok(&self.sessions[index])
    }

    /// A non-deleted session by id
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id && !s.is_deleted)
    }

    /// Conversation context of the active session
    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Mutable conversation context of the active session
    pub fn context_mut(&mut self) -> &mut ConversationContext {
        &mut self.context
    }

    /// Token for a new turn; cancelled by the next session or module switch
    pub fn begin_turn(&self) -> CancellationToken {
        self.turns.child_token()
    }

    /// Create an empty session and make it active
    pub async fn create(&mut self) -> Result<SessionSummary, AppError> {
        self.sessions.insert(0, Session::new());
        self.activate(0);
        self.persist().await?;
        debug!(session_id = %self.active_id, "Created session");
        Ok(SessionSummary::from(&self.sessions[0]))
    }

    /// Make a non-deleted session active and rebuild the context from it
    pub async fn select(&mut self, id: &str) -> Result<(), AppError> {
        let index = self.live_position(id)?;
        if self.active_id != id {
            self.activate(index);
            self.sessions[index].touch();
            self.persist().await?;
            debug!(session_id = %id, "Selected session");
        }
        Ok(())
    }

    /// Rename any session by id (deleted ones included, so a late title
    /// callback still lands)
    pub async fn rename(&mut self, id: &str, title: &str) -> Result<(), AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
        }
        let index = self
            .position(id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        let session = &mut self.sessions[index];
        session.title = title.to_string();
        session.touch();
        self.persist().await
    }

    /// Soft-delete a session. Deleting the active session selects the first
    /// remaining one, or creates a fresh session when none is left.
    pub async fn delete(&mut self, id: &str) -> Result<(), AppError> {
        let index = self.live_position(id)?;
        self.sessions[index].is_deleted = true;
        self.sessions[index].touch();

        if self.active_id == id {
            match self.sessions.iter().position(|s| !s.is_deleted) {
                Some(next) => self.activate(next),
                None => {
                    self.sessions.insert(0, Session::new());
                    self.activate(0);
                }
            }
        }

        self.persist().await?;
        info!(session_id = %id, active = %self.active_id, "Deleted session");
        Ok(())
    }

    /// Soft-delete every session, then start one fresh session
    pub async fn clear_all(&mut self) -> Result<(), AppError> {
        for session in self.sessions.iter_mut().filter(|s| !s.is_deleted) {
            session.is_deleted = true;
            session.touch();
        }
        self.sessions.insert(0, Session::new());
        self.activate(0);
        self.persist().await?;
        info!(user_id = %self.user_id, "Cleared all sessions");
        Ok(())
    }

    /// Switch the active session's module
    pub async fn set_module(&mut self, module: Module) -> Result<(), AppError> {
        let index = self.active_index()?;
        if self.sessions[index].active_module == module {
            return Ok(());
        }
        self.sessions[index].active_module = module;
        self.sessions[index].touch();
        self.activate(index);
        self.persist().await
    }

    /// Append a message to a session
    pub async fn append_message(&mut self, session_id: &str, message: Message) -> Result<(), AppError> {
        let index = self.live_position(session_id)?;
        let session = &mut self.sessions[index];
        session.messages.push(message);
        session.touch();
        self.persist().await
    }

    /// Apply a content, media or download write to a streaming message
    ///
    /// # Returns
    /// * `Ok(false)` when the message is already settled
    pub async fn update_message(
        &mut self,
        session_id: &str,
        message_id: &str,
        edit: MessageEdit,
    ) -> Result<bool, AppError> {
        let index = self
            .position(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        let session = &mut self.sessions[index];
        let position = session
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| AppError::MessageNotFound(message_id.to_string()))?;
        let previous = session.messages[position].clone();
        let last_modified = session.last_modified;
        if !session.messages[position].apply_edit(edit) {
            return Ok(false);
        }
        session.touch();

        // Keep memory in line with the store when the write is lost
        if let Err(e) = self.persist().await {
            let session = &mut self.sessions[index];
            session.messages[position] = previous;
            session.last_modified = last_modified;
            return Err(e);
        }
        Ok(true)
    }

    /// Append one streamed chunk to a streaming message
    pub async fn append_chunk(
        &mut self,
        session_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<bool, AppError> {
        self.update_message(
            session_id,
            message_id,
            MessageEdit::AppendChunk {
                text: text.to_string(),
            },
        )
        .await
    }

    /// Settle a streaming message
    ///
    /// # Returns
    /// * `Ok(true)` if this call performed the transition
    pub async fn settle_message(&mut self, session_id: &str, message_id: &str) -> Result<bool, AppError> {
        let index = self
            .position(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        let session = &mut self.sessions[index];
        let message = session
            .message_mut(message_id)
            .ok_or_else(|| AppError::MessageNotFound(message_id.to_string()))?;
        if !message.settle() {
            return Ok(false);
        }
        session.touch();
        self.persist().await?;
        Ok(true)
    }

    fn find_message_mut(&mut self, message_id: &str) -> Result<&mut Message, AppError> {
        let session = self
            .sessions
            .iter_mut()
            .filter(|s| !s.is_deleted)
            .find(|s| s.messages.iter().any(|m| m.id == message_id))
            .ok_or_else(|| AppError::MessageNotFound(message_id.to_string()))?;
        session.touch();
        session
            .message_mut(message_id)
            .ok_or_else(|| AppError::MessageNotFound(message_id.to_string()))
    }

    /// A message in any live session
    pub fn find_message(&self, message_id: &str) -> Option<(&Session, &Message)> {
        self.sessions
            .iter()
            .filter(|s| !s.is_deleted)
            .find_map(|s| s.messages.iter().find(|m| m.id == message_id).map(|m| (s, m)))
    }

    /// Set or toggle the reaction on a message
    pub async fn set_reaction(&mut self, message_id: &str, reaction: Reaction) -> Result<Option<Reaction>, AppError> {
        let message = self.find_message_mut(message_id)?;
        message.toggle_reaction(reaction);
        let current = message.reaction;
        self.persist().await?;
        Ok(current)
    }

    /// Store feedback text on a message; blank text clears it
    pub async fn set_feedback(&mut self, message_id: &str, feedback: &str) -> Result<(), AppError> {
        let message = self.find_message_mut(message_id)?;
        let feedback = feedback.trim();
        message.feedback = (!feedback.is_empty()).then(|| feedback.to_string());
        self.persist().await
    }
}
