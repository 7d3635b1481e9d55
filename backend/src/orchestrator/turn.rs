//! Session writer for one turn
//!
//! Every write checks the turn token while holding the session lock. Once a
//! session or module switch has cancelled the token, appends and edits are
//! dropped; settling still goes through so no message is left streaming.
//! [`Turn::settle_with`] replaces the content as part of settling, so it
//! lands after cancellation too.

use super::events::{EventSink, TurnEvent};
use crate::chat::context::ChatTurn;
use crate::chat::manager::SessionManager;
use crate::chat::models::{Message, MessageEdit};
use crate::error::AppError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) struct Turn<'a> {
    sessions: Arc<Mutex<SessionManager>>,
    session_id: String,
    token: CancellationToken,
    events: &'a EventSink,
}

impl<'a> Turn<'a> {
    pub(crate) fn new(
        sessions: Arc<Mutex<SessionManager>>,
        session_id: String,
        token: CancellationToken,
        events: &'a EventSink,
    ) -> Self {
        Self {
            sessions,
            session_id,
            token,
            events,
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `fut` unless the turn is cancelled first
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = fut => Some(output),
        }
    }

    /// Append a message; `false` when the turn was cancelled
    pub(crate) async fn append(&self, message: Message) -> Result<bool, AppError> {
        let mut sessions = self.sessions.lock().await;
        if self.token.is_cancelled() {
            debug!(session_id = %self.session_id, "Dropped message for cancelled turn");
            return Ok(false);
        }
        sessions
            .append_message(&self.session_id, message.clone())
            .await?;
        self.events.emit(TurnEvent::MessageAppended {
            session_id: self.session_id.clone(),
            message,
        });
        Ok(true)
    }

    /// Apply a write to a streaming message; `false` when it was dropped
    pub(crate) async fn write(&self, message_id: &str, edit: MessageEdit) -> Result<bool, AppError> {
        let mut sessions = self.sessions.lock().await;
        if self.token.is_cancelled() {
            debug!(
                session_id = %self.session_id,
                message_id = %message_id,
                "Dropped stale write"
            );
            return Ok(false);
        }

        let chunk = match &edit {
            MessageEdit::AppendChunk { text } => Some(text.clone()),
            _ => None,
        };
        if !sessions
            .update_message(&self.session_id, message_id, edit)
            .await?
        {
            return Ok(false);
        }

        match chunk {
            Some(text) => self.events.emit(TurnEvent::Chunk {
                session_id: self.session_id.clone(),
                message_id: message_id.to_string(),
                text,
            }),
            None => {
                if let Some((_, message)) = sessions.find_message(message_id) {
                    self.events.emit(TurnEvent::MessageUpdated {
                        session_id: self.session_id.clone(),
                        message: message.clone(),
                    });
                }
            }
        }
        Ok(true)
    }

    /// Settle a message, cancelled or not
    pub(crate) async fn settle(&self, message_id: &str) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.settle_message(&self.session_id, message_id).await? {
            self.events.emit(TurnEvent::Settled {
                session_id: self.session_id.clone(),
                message_id: message_id.to_string(),
            });
        }
        Ok(())
    }

    /// Replace a message's content and settle it, cancelled or not
    ///
    /// Used for terminal lines that must not be left as placeholders.
    pub(crate) async fn settle_with(&self, message_id: &str, content: &str) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        let replaced = sessions
            .update_message(
                &self.session_id,
                message_id,
                MessageEdit::ReplaceContent {
                    content: content.to_string(),
                },
            )
            .await;
        let settled = sessions.settle_message(&self.session_id, message_id).await;

        if matches!(replaced, Ok(true)) {
            if let Some((_, message)) = sessions.find_message(message_id) {
                self.events.emit(TurnEvent::MessageUpdated {
                    session_id: self.session_id.clone(),
                    message: message.clone(),
                });
            }
        }
        if matches!(settled, Ok(true)) {
            self.events.emit(TurnEvent::Settled {
                session_id: self.session_id.clone(),
                message_id: message_id.to_string(),
            });
        }
        replaced?;
        settled?;
        Ok(())
    }

    /// Add a finished exchange to the live conversation context
    pub(crate) async fn record_exchange(&self, user: ChatTurn, model_text: &str) {
        let mut sessions = self.sessions.lock().await;
        if self.token.is_cancelled() || sessions.context().session_id() != self.session_id {
            return;
        }
        sessions.context_mut().record_exchange(user, model_text);
    }
}
