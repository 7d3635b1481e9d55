//! Chat module
//!
//! Session and message models, the session manager, the conversation
//! context, and the text processing applied to model output (display
//! formatting and inline media directives).

pub mod context;
pub mod directive;
pub mod formatter;
pub mod manager;
pub mod models;

pub use context::{ChatTurn, ConversationContext};
pub use directive::{parse_directive, MediaDirective};
pub use formatter::{format_message, Block, Span};
pub use manager::SessionManager;
pub use models::{
    Attachment, DownloadFile, MediaKind, MediaRef, Message, MessageEdit, MessageRole, Module,
    Reaction, Session, SessionSummary,
};
