//! Media generation
//!
//! One entry point for image, video and speech requests, shared by the
//! dedicated media modules and by directives found in chat replies.

use super::config::OrchestratorConfig;
use super::turn::Turn;
use crate::chat::models::{Attachment, MediaKind, MediaRef, Message, MessageEdit};
use crate::error::AppError;
use crate::services::audio::pcm_to_wav;
use crate::services::{BackendError, GeneratedMedia, GenerativeBackend};
use tracing::{info, warn};

/// MIME type of wrapped speech
pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Produce one piece of media as a data URL
///
/// Videos use the first attachment, if any, as the conditioning image.
pub async fn generate_media(
    backend: &dyn GenerativeBackend,
    config: &OrchestratorConfig,
    kind: MediaKind,
    prompt: &str,
    attachments: &[Attachment],
) -> Result<MediaRef, BackendError> {
    let prompt = prompt.trim();
    let conditioning = attachments.first();

    if prompt.is_empty() && !(kind == MediaKind::Video && conditioning.is_some()) {
        return Err(BackendError::NoResult("empty prompt".to_string()));
    }

    let media = match kind {
        MediaKind::Image => backend.generate_image(prompt, config.image_size).await?,
        MediaKind::Video => {
            backend
                .generate_video(prompt, config.video_aspect_ratio, conditioning)
                .await?
        }
        MediaKind::Audio => {
            let pcm = backend.generate_speech(prompt).await?;
            GeneratedMedia {
                mime_type: WAV_MIME_TYPE.to_string(),
                data: pcm_to_wav(&pcm, config.speech_sample_rate),
            }
        }
    };

    info!(kind = ?kind, bytes = media.data.len(), "Generated media");
    Ok(MediaRef {
        kind,
        url: media.to_data_url(),
    })
}

/// Run a media module turn: one model message carrying the media, or the
/// kind's failure line
pub(crate) async fn run_media_turn(
    turn: &Turn<'_>,
    backend: &dyn GenerativeBackend,
    config: &OrchestratorConfig,
    kind: MediaKind,
    prompt: &str,
    attachments: &[Attachment],
) -> Result<Vec<String>, AppError> {
    let message = Message::streaming_model("");
    let message_id = message.id.clone();
    if !turn.append(message).await? {
        return Ok(Vec::new());
    }

    let written = write_media(turn, &message_id, backend, config, kind, prompt, attachments).await;
    let settled = turn.settle(&message_id).await;
    written?;
    settled?;
    Ok(vec![message_id])
}

async fn write_media(
    turn: &Turn<'_>,
    message_id: &str,
    backend: &dyn GenerativeBackend,
    config: &OrchestratorConfig,
    kind: MediaKind,
    prompt: &str,
    attachments: &[Attachment],
) -> Result<(), AppError> {
    match turn
        .run(generate_media(backend, config, kind, prompt, attachments))
        .await
    {
        Some(Ok(media)) => {
            turn.write(message_id, MessageEdit::AttachMedia { media })
                .await?;
        }
        Some(Err(e)) => {
            warn!(kind = ?kind, error = %e, "Media generation failed");
            turn.write(
                message_id,
                MessageEdit::ReplaceContent {
                    content: kind.failure_text().to_string(),
                },
            )
            .await?;
        }
        None => {}
    }
    Ok(())
}
