//! Converter module turns
//!
//! Files are converted one after another. Each file gets its own model
//! message. When the conversion service is missing or fails, the generative
//! backend is asked once to extract the file's text, which is offered as a
//! `.txt` download instead.

use super::config::OrchestratorConfig;
use super::constants::{
    conversion_progress_text, conversion_success_text, CONVERSION_CANCELLED_TEXT,
    CONVERSION_FAILURE_TEXT,
};
use super::turn::Turn;
use crate::chat::context::ConversationContext;
use crate::chat::models::{Attachment, DownloadFile, Message, MessageEdit};
use crate::error::AppError;
use crate::services::converter::file_stem;
use crate::services::{BackendError, DocumentConverter, GenerativeBackend};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{info, warn};

/// Ask the generative backend for the file's text
async fn fallback_download(
    backend: &dyn GenerativeBackend,
    context: &ConversationContext,
    prompt: &str,
    file: &Attachment,
) -> Result<DownloadFile, BackendError> {
    let text = backend
        .complete(context, prompt, std::slice::from_ref(file))
        .await?;
    Ok(DownloadFile {
        file_name: format!("{}.txt", file_stem(&file.name)),
        mime_type: "text/plain".to_string(),
        data: BASE64.encode(text.as_bytes()),
    })
}

async fn convert_one(
    backend: &dyn GenerativeBackend,
    converter: Option<&dyn DocumentConverter>,
    context: &ConversationContext,
    prompt: &str,
    file: &Attachment,
) -> Option<DownloadFile> {
    let converted = match converter {
        Some(converter) => converter.convert(file).await,
        None => Err(BackendError::Unsupported(
            "no conversion service configured".to_string(),
        )),
    };

    match converted {
        Ok(converted) => {
            info!(file = %file.name, output = %converted.file_name, "Converted file");
            return Some(DownloadFile {
                file_name: converted.file_name,
                mime_type: converted.mime_type,
                data: BASE64.encode(&converted.data),
            });
        }
        Err(e) => {
            warn!(file = %file.name, error = %e, "Conversion failed, falling back to text extraction");
        }
    }

    match fallback_download(backend, context, prompt, file).await {
        Ok(download) => Some(download),
        Err(e) => {
            warn!(file = %file.name, error = %e, "Conversion fallback failed");
            None
        }
    }
}

/// Convert one file and write the outcome into its message
///
/// # Returns
/// * `Ok(false)` when the turn was cancelled before the outcome landed
async fn write_conversion(
    turn: &Turn<'_>,
    message_id: &str,
    backend: &dyn GenerativeBackend,
    converter: Option<&dyn DocumentConverter>,
    context: &ConversationContext,
    prompt: &str,
    file: &Attachment,
) -> Result<bool, AppError> {
    let Some(result) = turn
        .run(convert_one(backend, converter, context, prompt, file))
        .await
    else {
        return Ok(false);
    };

    match result {
        Some(download) => {
            let replaced = turn
                .write(
                    message_id,
                    MessageEdit::ReplaceContent {
                        content: conversion_success_text(&file.name),
                    },
                )
                .await?;
            Ok(replaced
                && turn
                    .write(message_id, MessageEdit::AttachDownload { download })
                    .await?)
        }
        None => {
            turn.write(
                message_id,
                MessageEdit::ReplaceContent {
                    content: CONVERSION_FAILURE_TEXT.to_string(),
                },
            )
            .await
        }
    }
}

/// Convert every attachment in order; one file's failure never stops the rest
pub(crate) async fn run_conversion(
    turn: &Turn<'_>,
    backend: &dyn GenerativeBackend,
    converter: Option<&dyn DocumentConverter>,
    context: &ConversationContext,
    config: &OrchestratorConfig,
    attachments: &[Attachment],
) -> Result<Vec<String>, AppError> {
    let mut message_ids = Vec::with_capacity(attachments.len());

    for file in attachments {
        if turn.is_cancelled() {
            break;
        }

        let message = Message::streaming_model(conversion_progress_text(&file.name));
        let message_id = message.id.clone();
        if !turn.append(message).await? {
            break;
        }
        message_ids.push(message_id.clone());

        let written = write_conversion(
            turn,
            &message_id,
            backend,
            converter,
            context,
            &config.conversion_prompt,
            file,
        )
        .await;

        match written {
            Ok(true) => turn.settle(&message_id).await?,
            Ok(false) => {
                info!(file = %file.name, "Conversion cancelled");
                turn.settle_with(&message_id, CONVERSION_CANCELLED_TEXT)
                    .await?
            }
            Err(e) => {
                if let Err(settle_error) = turn
                    .settle_with(&message_id, CONVERSION_FAILURE_TEXT)
                    .await
                {
                    warn!(file = %file.name, error = %settle_error, "Failed to store settled file message");
                }
                return Err(e);
            }
        }
    }

    Ok(message_ids)
}
