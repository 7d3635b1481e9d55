//! Chat data models
//!
//! Sessions, messages and the pieces hanging off a message (media,
//! attachments, downloads, reactions).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title carried by a session until one is generated or set by the user
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Current time as Unix milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Operating mode of a session; decides which backend capability
/// user input is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Free-form assistant chat
    #[default]
    General,
    /// Summarizes pasted text or attached documents
    Summarizer,
    /// Converts attached files
    Converter,
    /// Generates one image per prompt
    ImageGenerator,
    /// Generates one video per prompt
    VideoGenerator,
    /// Reads the prompt aloud
    TextToSpeech,
}

impl Module {
    /// Every module, in menu order
    pub const ALL: [Module; 6] = [
        Module::General,
        Module::Summarizer,
        Module::Converter,
        Module::ImageGenerator,
        Module::VideoGenerator,
        Module::TextToSpeech,
    ];

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Module::General => "General",
            Module::Summarizer => "Summarizer",
            Module::Converter => "Converter",
            Module::ImageGenerator => "Image Generator",
            Module::VideoGenerator => "Video Generator",
            Module::TextToSpeech => "Text to Speech",
        }
    }

    /// System instruction used when the conversation context is initialized
    pub fn system_instruction(&self) -> &'static str {
        match self {
            Module::General => {
                "You are SwiftMind, a helpful and concise assistant. Use headings, bullet \
                 lists, tables and **bold** text where they help. When the user explicitly \
                 asks for an image, a video or spoken audio, add exactly one tag of the form \
                 [[IMAGE: prompt]], [[VIDEO: prompt]] or [[AUDIO: text]] to your answer."
            }
            Module::Summarizer => {
                "You are SwiftMind's summarizer. Produce a short overview followed by the \
                 key points as a bullet list. Keep numbers and names exact."
            }
            Module::Converter => {
                "You are SwiftMind's file converter. Extract the full content of the \
                 attached file and return it as clean, well-structured plain text."
            }
            Module::ImageGenerator => "You write vivid, precise image prompts.",
            Module::VideoGenerator => "You write vivid, precise video prompts.",
            Module::TextToSpeech => "You prepare text to be read aloud.",
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the model
    Model,
    /// Locally generated notice
    System,
}

/// Kind of generated media attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video clip
    Video,
    /// Audio clip
    Audio,
}

impl MediaKind {
    /// Content line used when generating this kind of media failed
    pub fn failure_text(&self) -> &'static str {
        match self {
            MediaKind::Image => "Failed to generate image.",
            MediaKind::Video => "Failed to generate video.",
            MediaKind::Audio => "Failed to generate speech.",
        }
    }
}

/// Reference to generated media (a data URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Media kind
    pub kind: MediaKind,
    /// `data:` URL holding the media
    pub url: String,
}

/// File supplied by the user along with a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name
    pub name: String,
    /// MIME type reported by the client
    pub mime_type: String,
    /// Base64 encoded file content
    pub data: String,
}

/// Thumbs up / thumbs down on a model message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    #[allow(missing_docs)]
    Like,
    #[allow(missing_docs)]
    Dislike,
}

/// File offered for download from a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadFile {
    /// Suggested file name
    pub file_name: String,
    /// MIME type of the payload
    pub mime_type: String,
    /// Base64 encoded payload
    pub data: String,
}

/// Write applied to a message while it is still streaming
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageEdit {
    /// Append one streamed chunk to the content
    AppendChunk {
        /// Text to append
        text: String,
    },
    /// Replace the whole content
    ReplaceContent {
        /// New content
        content: String,
    },
    /// Attach generated media
    AttachMedia {
        /// Media reference
        media: MediaRef,
    },
    /// Attach a downloadable file
    AttachDownload {
        /// File payload
        download: DownloadFile,
    },
}

/// A single message in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier
    pub id: String,
    /// Sender role
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Creation time (Unix milliseconds)
    pub timestamp: i64,
    is_streaming: bool,
    /// Generated media, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    /// Files sent with the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Reaction left by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
    /// Free-text feedback left by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Downloadable result (conversion output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadFile>,
}

impl Message {
    fn new(role: MessageRole, content: String, is_streaming: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: now_millis(),
            is_streaming,
            media: None,
            attachments: Vec::new(),
            reaction: None,
            feedback: None,
            download: None,
        }
    }

    /// A settled user message
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        let mut message = Self::new(MessageRole::User, content.into(), false);
        message.attachments = attachments;
        message
    }

    /// A settled model message
    pub fn model(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, content.into(), false)
    }

    /// A settled system notice
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into(), false)
    }

    /// A model message under construction. This is the only way to obtain a
    /// message with the streaming flag set.
    pub fn streaming_model(placeholder: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, placeholder.into(), true)
    }

    /// Whether the message is still under construction
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Apply an edit. Settled messages reject every edit.
    ///
    /// # Returns
    /// * `true` if the edit was applied
    pub fn apply_edit(&mut self, edit: MessageEdit) -> bool {
        if !self.is_streaming {
            return false;
        }
        match edit {
            MessageEdit::AppendChunk { text } => self.content.push_str(&text),
            MessageEdit::ReplaceContent { content } => self.content = content,
            MessageEdit::AttachMedia { media } => self.media = Some(media),
            MessageEdit::AttachDownload { download } => self.download = Some(download),
        }
        true
    }

    /// Terminal transition streaming -> settled
    ///
    /// # Returns
    /// * `true` if this call performed the transition
    pub fn settle(&mut self) -> bool {
        std::mem::replace(&mut self.is_streaming, false)
    }

    /// Set a reaction; setting the current reaction again clears it
    pub fn toggle_reaction(&mut self, reaction: Reaction) {
        self.reaction = if self.reaction == Some(reaction) {
            None
        } else {
            Some(reaction)
        };
    }
}

/// One saved conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Ordered, append-only message list
    pub messages: Vec<Message>,
    /// Module input is routed to
    pub active_module: Module,
    /// Last mutation (Unix milliseconds)
    pub last_modified: i64,
    /// Soft-delete flag; deleted sessions stay in storage
    #[serde(default)]
    pub is_deleted: bool,
}

impl Session {
    /// Create an empty, untitled session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            active_module: Module::General,
            last_modified: now_millis(),
            is_deleted: false,
        }
    }

    /// Whether the session still carries the default title
    pub fn is_untitled(&self) -> bool {
        self.title == DEFAULT_SESSION_TITLE
    }

    /// Whether any user message with text exists
    pub fn has_user_text(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
    }

    /// Refresh `last_modified`
    pub fn touch(&mut self) {
        self.last_modified = now_millis();
    }

    /// Find a message by id
    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Settle every message left streaming (e.g. after a restart)
    ///
    /// # Returns
    /// * Number of messages settled
    pub fn settle_dangling(&mut self) -> usize {
        self.messages
            .iter_mut()
            .map(|m| m.settle())
            .filter(|settled| *settled)
            .count()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing entry for a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session id
    pub id: String,
    /// Session title
    pub title: String,
    /// Active module
    pub active_module: Module,
    /// Last mutation (Unix milliseconds)
    pub last_modified: i64,
    /// Number of messages
    pub message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            active_module: session.active_module,
            last_modified: session.last_modified,
            message_count: session.messages.len(),
        }
    }
}
