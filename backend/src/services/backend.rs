//! Backend abstractions
//!
//! The orchestrator only talks to these traits; the Gemini and iLovePDF
//! clients implement them, tests substitute fakes.

use crate::chat::context::ConversationContext;
use crate::chat::models::Attachment;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by backend clients
#[derive(Error, Debug)]
pub enum BackendError {
    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// Credential rejected or entity not found
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Call succeeded but produced nothing usable
    #[error("No result produced: {0}")]
    NoResult(String),

    /// Response body could not be decoded
    #[error("Failed to parse backend response: {0}")]
    Parse(String),

    /// Operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Input the backend cannot handle
    #[error("Unsupported input: {0}")]
    Unsupported(String),

    /// Turn was cancelled by a session or module switch
    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else if e.is_decode() {
            BackendError::Parse(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Parse(e.to_string())
    }
}

impl From<base64::DecodeError> for BackendError {
    fn from(e: base64::DecodeError) -> Self {
        BackendError::Parse(format!("invalid base64 payload: {}", e))
    }
}

/// Incremental text chunks, in arrival order
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

/// Requested image shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    /// 1:1
    #[default]
    Square,
    /// 16:9
    Landscape,
    /// 9:16
    Portrait,
}

impl ImageSize {
    /// Aspect ratio string understood by the image model
    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            ImageSize::Square => "1:1",
            ImageSize::Landscape => "16:9",
            ImageSize::Portrait => "9:16",
        }
    }
}

/// Requested video shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 16:9
    #[default]
    Landscape,
    /// 9:16
    Portrait,
}

impl AspectRatio {
    /// Aspect ratio string understood by the video model
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// Binary media returned by a generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMedia {
    /// MIME type of `data`
    pub mime_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl GeneratedMedia {
    /// Encode as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }
}

/// Output of a document conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    /// Suggested file name
    pub file_name: String,
    /// MIME type of `data`
    pub mime_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

/// Generative AI capabilities consumed by the orchestrator
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Send a message within `context` and stream the reply
    async fn stream_chat(
        &self,
        context: &ConversationContext,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<TextStream, BackendError>;

    /// Send a message within `context` and wait for the whole reply
    async fn complete(
        &self,
        context: &ConversationContext,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<String, BackendError>;

    /// Produce a short session title from the first user message
    async fn generate_title(&self, first_message: &str) -> Result<String, BackendError>;

    /// Generate one image
    async fn generate_image(&self, prompt: &str, size: ImageSize) -> Result<GeneratedMedia, BackendError>;

    /// Generate one video, optionally conditioned on an image
    async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        image: Option<&Attachment>,
    ) -> Result<GeneratedMedia, BackendError>;

    /// Synthesize speech; returns raw 16-bit mono PCM samples
    async fn generate_speech(&self, text: &str) -> Result<Vec<u8>, BackendError>;
}

/// Document conversion service
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert one file
    async fn convert(&self, file: &Attachment) -> Result<ConvertedFile, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_encoding() {
        let media = GeneratedMedia {
            mime_type: "image/png".to_string(),
            data: vec![0, 1, 2],
        };
        assert_eq!(media.to_data_url(), "data:image/png;base64,AAEC");
    }

    #[test]
    fn test_aspect_ratios() {
        assert_eq!(ImageSize::Landscape.aspect_ratio(), "16:9");
        assert_eq!(AspectRatio::Portrait.as_str(), "9:16");
    }
}
