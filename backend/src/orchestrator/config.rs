//! Orchestrator configuration
//!
//! Runtime-tunable settings for turns: media shapes, speech sample rate,
//! input limits and the conversion fallback prompt.

use crate::error::AppError;
use crate::services::audio::SPEECH_SAMPLE_RATE;
use crate::services::{AspectRatio, ImageSize};
use serde::{Deserialize, Serialize};

/// Prompt sent with a file when the conversion service is unavailable
pub const DEFAULT_CONVERSION_PROMPT: &str =
    "Extract the complete content of the attached file and return it as clean, \
     well-structured plain text. Do not add commentary.";

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorConfig {
    /// Shape of generated images
    pub image_size: ImageSize,
    /// Shape of generated videos
    pub video_aspect_ratio: AspectRatio,
    /// Sample rate written into WAV headers
    pub speech_sample_rate: u32,
    /// Maximum user input length in characters
    pub max_input_length: usize,
    /// Maximum number of attachments per message
    pub max_attachments: usize,
    /// Prompt for the conversion fallback
    pub conversion_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            image_size: ImageSize::Square,
            video_aspect_ratio: AspectRatio::Landscape,
            speech_sample_rate: SPEECH_SAMPLE_RATE,
            max_input_length: 10_000,
            max_attachments: 10,
            conversion_prompt: DEFAULT_CONVERSION_PROMPT.to_string(),
        }
    }
}

/// Request body for updating orchestrator configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdateRequest {
    /// Shape of generated images (optional)
    pub image_size: Option<ImageSize>,
    /// Shape of generated videos (optional)
    pub video_aspect_ratio: Option<AspectRatio>,
    /// WAV sample rate (optional)
    pub speech_sample_rate: Option<u32>,
    /// Maximum user input length (optional)
    pub max_input_length: Option<usize>,
    /// Maximum attachments per message (optional)
    pub max_attachments: Option<usize>,
    /// Conversion fallback prompt (optional)
    pub conversion_prompt: Option<String>,
}

/// Validate and apply configuration updates
///
/// Nothing is applied when any field fails validation.
///
/// # Arguments
/// * `config` - The current config to update
/// * `request` - The update request with optional fields
///
/// # Returns
/// * `Ok(OrchestratorConfig)` - The updated configuration
/// * `Err(AppError)` - If validation fails
pub fn validate_and_apply_config_update(
    mut config: OrchestratorConfig,
    request: ConfigUpdateRequest,
) -> Result<OrchestratorConfig, AppError> {
    if let Some(size) = request.image_size {
        config.image_size = size;
    }

    if let Some(aspect) = request.video_aspect_ratio {
        config.video_aspect_ratio = aspect;
    }

    if let Some(rate) = request.speech_sample_rate {
        if !(8_000..=48_000).contains(&rate) {
            return Err(AppError::InvalidInput(
                "speech_sample_rate must be between 8000 and 48000".to_string(),
            ));
        }
        config.speech_sample_rate = rate;
    }

    if let Some(max_input) = request.max_input_length {
        if max_input == 0 {
            return Err(AppError::InvalidInput(
                "max_input_length must be > 0".to_string(),
            ));
        }
        config.max_input_length = max_input;
    }

    if let Some(max_attachments) = request.max_attachments {
        if max_attachments == 0 {
            return Err(AppError::InvalidInput(
                "max_attachments must be > 0".to_string(),
            ));
        }
        config.max_attachments = max_attachments;
    }

    if let Some(prompt) = request.conversion_prompt {
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "conversion_prompt cannot be empty".to_string(),
            ));
        }
        config.conversion_prompt = prompt;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let request = ConfigUpdateRequest {
            image_size: Some(ImageSize::Portrait),
            max_input_length: Some(500),
            ..Default::default()
        };
        let updated =
            validate_and_apply_config_update(OrchestratorConfig::default(), request).unwrap();
        assert_eq!(updated.image_size, ImageSize::Portrait);
        assert_eq!(updated.max_input_length, 500);
        assert_eq!(updated.video_aspect_ratio, AspectRatio::Landscape);
        assert_eq!(updated.speech_sample_rate, 24_000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let zero = ConfigUpdateRequest {
            max_attachments: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            validate_and_apply_config_update(OrchestratorConfig::default(), zero),
            Err(AppError::InvalidInput(_))
        ));

        let rate = ConfigUpdateRequest {
            speech_sample_rate: Some(1),
            ..Default::default()
        };
        assert!(validate_and_apply_config_update(OrchestratorConfig::default(), rate).is_err());

        let prompt = ConfigUpdateRequest {
            conversion_prompt: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(validate_and_apply_config_update(OrchestratorConfig::default(), prompt).is_err());
    }
}
