//! Gemini API wire types
//!
//! Structs that mirror the Gemini, Imagen and Veo JSON formats.
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Request body for `generateContent` / `streamGenerateContent`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns, oldest first
    pub contents: Vec<Content>,
    /// System instruction for the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Optional generation configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// One turn of content
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// `user` or `model`; absent for system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Parts of the turn
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A turn holding a single text part
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part::text(text)],
        }
    }
}

/// A text or inline binary part
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64 binary content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    /// A text part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// An inline binary part
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

/// Base64 payload with its MIME type
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type
    pub mime_type: String,
    /// Base64 data
    pub data: String,
}

/// Generation configuration for requests
#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// MIME type to force for the response (e.g. "application/json")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Output modalities (e.g. `["AUDIO"]`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    /// Voice selection for speech output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

/// Speech output configuration
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    #[allow(missing_docs)]
    pub voice_config: VoiceConfig,
}

/// Voice wrapper
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    #[allow(missing_docs)]
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

/// Named prebuilt voice
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    /// Voice name, e.g. "Kore"
    pub voice_name: String,
}

/// Top-level `generateContent` response (also one SSE event of a stream)
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate responses from the model
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Feedback about the prompt (e.g. if it was blocked)
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Block reason, if the prompt was blocked
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    /// Concatenated text parts of the first candidate
    pub fn text(&self) -> String {
        self.first_parts()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// First inline binary part of the first candidate
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.first_parts().find_map(|p| p.inline_data.as_ref())
    }

    fn first_parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter())
            .into_iter()
            .flatten()
    }
}

/// A single candidate response from the model
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Content of this candidate
    #[serde(default)]
    pub content: Option<Content>,
    /// Why the model stopped generating
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Feedback about the prompt (e.g. if it was blocked)
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Reason the prompt was blocked
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Imagen `predict` request
#[derive(Serialize, Debug)]
pub struct ImagePredictRequest {
    #[allow(missing_docs)]
    pub instances: Vec<PromptInstance>,
    #[allow(missing_docs)]
    pub parameters: ImageParameters,
}

/// Prompt instance for Imagen
#[derive(Serialize, Debug)]
pub struct PromptInstance {
    #[allow(missing_docs)]
    pub prompt: String,
}

/// Imagen parameters
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageParameters {
    /// Number of images
    pub sample_count: u32,
    /// e.g. "1:1"
    pub aspect_ratio: String,
}

/// Imagen `predict` response
#[derive(Deserialize, Debug)]
pub struct ImagePredictResponse {
    #[allow(missing_docs)]
    #[serde(default)]
    pub predictions: Vec<ImagePrediction>,
}

/// One generated image
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImagePrediction {
    /// Base64 image bytes
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    /// Image MIME type
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Veo `predictLongRunning` request
#[derive(Serialize, Debug)]
pub struct VideoPredictRequest {
    #[allow(missing_docs)]
    pub instances: Vec<VideoInstance>,
    #[allow(missing_docs)]
    pub parameters: VideoParameters,
}

/// Prompt plus optional conditioning image
#[derive(Serialize, Debug)]
pub struct VideoInstance {
    #[allow(missing_docs)]
    pub prompt: String,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<VideoImage>,
}

/// Conditioning image for Veo
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoImage {
    /// Base64 image bytes
    pub bytes_base64_encoded: String,
    /// Image MIME type
    pub mime_type: String,
}

/// Veo parameters
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    /// e.g. "16:9"
    pub aspect_ratio: String,
}

/// Long-running operation handle
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Resource name, polled with GET
    pub name: String,
    /// Whether the operation finished
    #[serde(default)]
    pub done: bool,
    /// Failure, when finished unsuccessfully
    #[serde(default)]
    pub error: Option<OperationError>,
    /// Result, when finished successfully
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

impl Operation {
    /// URI of the first generated video
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()
            .map(|v| v.uri.as_str())
    }
}

/// Operation failure
#[derive(Deserialize, Debug)]
pub struct OperationError {
    #[allow(missing_docs)]
    #[serde(default)]
    pub code: Option<i64>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub message: String,
}

/// Operation result
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    #[allow(missing_docs)]
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

/// Veo result body
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[allow(missing_docs)]
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

/// One generated sample
#[derive(Deserialize, Debug)]
pub struct GeneratedSample {
    #[allow(missing_docs)]
    #[serde(default)]
    pub video: Option<VideoRef>,
}

/// Downloadable video reference
#[derive(Deserialize, Debug)]
pub struct VideoRef {
    #[allow(missing_docs)]
    pub uri: String,
}
