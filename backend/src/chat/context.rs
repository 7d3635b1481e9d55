//! Conversation context
//!
//! Explicit state handed to the generative backend for one session: the
//! module's system instruction, the history turns, and the single
//! read-aloud slot (starting an utterance interrupts the previous one).

use crate::chat::models::{Attachment, MessageRole, Module, Session};
use serde::Serialize;

/// One history entry sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// `User` or `Model`
    pub role: MessageRole,
    /// Turn text
    pub text: String,
    /// Files sent with a user turn
    pub attachments: Vec<Attachment>,
}

impl ChatTurn {
    /// A user turn
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            attachments,
        }
    }

    /// A model turn
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Message currently being read aloud
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    /// Session owning the message
    pub session_id: String,
    /// Message being spoken
    pub message_id: String,
}

/// Conversation state for the active session
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    session_id: String,
    module: Module,
    history: Vec<ChatTurn>,
    utterance: Option<Utterance>,
}

impl ConversationContext {
    /// Rebuild the context from a session's history.
    ///
    /// Only settled user/model messages with text are replayed. The current
    /// utterance is dropped: switching sessions stops playback.
    pub fn from_session(session: &Session) -> Self {
        let history = session
            .messages
            .iter()
            .filter(|m| !m.is_streaming() && !m.content.trim().is_empty())
            .filter_map(|m| match m.role {
                MessageRole::User => Some(ChatTurn::user(m.content.clone(), m.attachments.clone())),
                MessageRole::Model => Some(ChatTurn::model(m.content.clone())),
                MessageRole::System => None,
            })
            .collect();

        Self {
            session_id: session.id.clone(),
            module: session.active_module,
            history,
            utterance: None,
        }
    }

    /// Session this context belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Module the context was initialized for
    pub fn module(&self) -> Module {
        self.module
    }

    /// System instruction for the backend
    pub fn system_instruction(&self) -> &'static str {
        self.module.system_instruction()
    }

    /// History turns, oldest first
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Record a completed exchange
    pub fn record_exchange(&mut self, user: ChatTurn, model_text: impl Into<String>) {
        self.history.push(user);
        self.history.push(ChatTurn::model(model_text));
    }

    /// Start reading a message aloud
    ///
    /// # Returns
    /// * The utterance that was interrupted, if any
    pub fn begin_utterance(&mut self, message_id: &str) -> Option<Utterance> {
        self.utterance.replace(Utterance {
            session_id: self.session_id.clone(),
            message_id: message_id.to_string(),
        })
    }

    /// Stop the current utterance
    pub fn stop_utterance(&mut self) -> Option<Utterance> {
        self.utterance.take()
    }

    /// Message currently being read aloud
    pub fn current_utterance(&self) -> Option<&Utterance> {
        self.utterance.as_ref()
    }
}
