//! Conversation orchestrator
//!
//! Routes one user input to exactly one backend capability based on the
//! active module, and writes the results into the session as they arrive.
//!
//! Backend failures never escape a turn: each call site turns its error into
//! message content. Only validation and storage errors are returned.

use super::config::OrchestratorConfig;
use super::constants::GENERIC_FAILURE_TEXT;
use super::conversion::run_conversion;
use super::events::{EventSink, TurnEvent};
use super::media::{generate_media, run_media_turn, WAV_MIME_TYPE};
use super::title::spawn_title;
use super::turn::Turn;
use crate::chat::context::{ChatTurn, ConversationContext, Utterance};
use crate::chat::directive::parse_directive;
use crate::chat::manager::SessionManager;
use crate::chat::models::{Attachment, MediaKind, Message, MessageEdit, Module};
use crate::error::AppError;
use crate::services::audio::pcm_to_wav;
use crate::services::{DocumentConverter, GeneratedMedia, GenerativeBackend};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// User input for one turn
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnInput {
    /// Message text
    #[serde(default)]
    pub text: String,
    /// Attached files
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// What a turn produced
#[derive(Debug)]
pub struct TurnOutcome {
    /// Session the turn ran in
    pub session_id: String,
    /// The appended user message
    pub user_message_id: String,
    /// Model messages created by the turn
    pub reply_ids: Vec<String>,
    /// Whether a session or module switch cancelled the turn
    pub cancelled: bool,
    /// Background title generation, when the turn started one
    pub title_task: Option<JoinHandle<()>>,
}

/// Result of reading a message aloud
#[derive(Debug, Clone, Serialize)]
pub struct SpokenMessage {
    /// Message that was read
    pub message_id: String,
    /// WAV data URL
    pub audio_url: String,
    /// Utterance this one interrupted
    pub interrupted: Option<Utterance>,
    /// Whether another utterance replaced this one while it was synthesized
    pub superseded: bool,
}

/// Runs turns against one user's sessions
pub struct Orchestrator {
    sessions: Arc<Mutex<SessionManager>>,
    backend: Arc<dyn GenerativeBackend>,
    converter: Option<Arc<dyn DocumentConverter>>,
    config: Arc<RwLock<OrchestratorConfig>>,
}

impl Orchestrator {
    /// Create an orchestrator
    ///
    /// # Arguments
    /// * `sessions` - The user's session manager
    /// * `backend` - Generative backend
    /// * `converter` - Conversion service; `None` sends every file to the fallback
    /// * `config` - Shared, runtime-updatable settings
    pub fn new(
        sessions: SessionManager,
        backend: Arc<dyn GenerativeBackend>,
        converter: Option<Arc<dyn DocumentConverter>>,
        config: Arc<RwLock<OrchestratorConfig>>,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions)),
            backend,
            converter,
            config,
        }
    }

    /// The session manager, for session-level operations
    pub fn sessions(&self) -> &Arc<Mutex<SessionManager>> {
        &self.sessions
    }

    fn validate(input: &TurnInput, config: &OrchestratorConfig) -> Result<(), AppError> {
        let text = input.text.trim();
        if text.is_empty() && input.attachments.is_empty() {
            return Err(AppError::InvalidInput(
                "Message needs text or at least one attachment".to_string(),
            ));
        }
        if text.chars().count() > config.max_input_length {
            return Err(AppError::InvalidInput(format!(
                "Message exceeds maximum length of {} characters",
                config.max_input_length
            )));
        }
        if input.attachments.len() > config.max_attachments {
            return Err(AppError::InvalidInput(format!(
                "At most {} attachments are allowed",
                config.max_attachments
            )));
        }
        Ok(())
    }

    /// Check input against the current limits
    pub async fn validate_input(&self, input: &TurnInput) -> Result<(), AppError> {
        let config = self.config.read().await;
        Self::validate(input, &config)
    }

    /// Run one turn in the active session
    ///
    /// # Arguments
    /// * `input` - Text and attachments from the user
    /// * `events` - Receives every write the turn makes
    pub async fn send(&self, input: TurnInput, events: &EventSink) -> Result<TurnOutcome, AppError> {
        let config = self.config.read().await.clone();
        Self::validate(&input, &config)?;

        let text = input.text.trim().to_string();
        let attachments = input.attachments;

        let (session_id, module, context, token, user_message_id, needs_title) = {
            let mut sessions = self.sessions.lock().await;
            let session_id = sessions.active_id().to_string();
            let needs_title = {
                let session = sessions.active()?;
                session.is_untitled() && !session.has_user_text() && !text.is_empty()
            };

            let user_message = Message::user(text.clone(), attachments.clone());
            let user_message_id = user_message.id.clone();
            sessions
                .append_message(&session_id, user_message.clone())
                .await?;
            events.emit(TurnEvent::MessageAppended {
                session_id: session_id.clone(),
                message: user_message,
            });

            let module = sessions.active()?.active_module;
            (
                session_id,
                module,
                sessions.context().clone(),
                sessions.begin_turn(),
                user_message_id,
                needs_title,
            )
        };

        info!(
            session_id = %session_id,
            module = ?module,
            attachments = attachments.len(),
            "Running turn"
        );

        let title_task = needs_title.then(|| {
            spawn_title(
                Arc::clone(&self.sessions),
                Arc::clone(&self.backend),
                session_id.clone(),
                text.clone(),
            )
        });

        let turn = Turn::new(Arc::clone(&self.sessions), session_id, token, events);
        let backend = self.backend.as_ref();

        let reply_ids = match module {
            Module::ImageGenerator => {
                run_media_turn(&turn, backend, &config, MediaKind::Image, &text, &attachments).await?
            }
            Module::VideoGenerator => {
                run_media_turn(&turn, backend, &config, MediaKind::Video, &text, &attachments).await?
            }
            Module::TextToSpeech => {
                run_media_turn(&turn, backend, &config, MediaKind::Audio, &text, &attachments).await?
            }
            Module::Converter if !attachments.is_empty() => {
                run_conversion(
                    &turn,
                    backend,
                    self.converter.as_deref(),
                    &context,
                    &config,
                    &attachments,
                )
                .await?
            }
            _ => self
                .run_generic(&turn, &context, &config, &text, &attachments)
                .await?
                .into_iter()
                .collect(),
        };

        let cancelled = turn.is_cancelled();
        if cancelled {
            info!(session_id = %turn.session_id(), "Turn cancelled by a session or module switch");
        }

        Ok(TurnOutcome {
            session_id: turn.session_id().to_string(),
            user_message_id,
            reply_ids,
            cancelled,
            title_task,
        })
    }

    /// Streamed text reply, then an optional directive-driven media call
    ///
    /// The reply settles even when a write in between fails.
    async fn run_generic(
        &self,
        turn: &Turn<'_>,
        context: &ConversationContext,
        config: &OrchestratorConfig,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<Option<String>, AppError> {
        let message = Message::streaming_model("");
        let message_id = message.id.clone();
        if !turn.append(message).await? {
            return Ok(None);
        }

        let written = self
            .write_generic_reply(turn, &message_id, context, config, text, attachments)
            .await;
        let settled = turn.settle(&message_id).await;
        written?;
        settled?;
        Ok(Some(message_id))
    }

    async fn write_generic_reply(
        &self,
        turn: &Turn<'_>,
        message_id: &str,
        context: &ConversationContext,
        config: &OrchestratorConfig,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<(), AppError> {
        let mut content = String::new();
        let mut failed = false;

        match turn
            .run(self.backend.stream_chat(context, text, attachments))
            .await
        {
            Some(Ok(mut stream)) => loop {
                let Some(next) = turn.run(stream.next()).await else {
                    break;
                };
                match next {
                    Some(Ok(chunk)) => {
                        if !turn
                            .write(message_id, MessageEdit::AppendChunk { text: chunk.clone() })
                            .await?
                        {
                            break;
                        }
                        content.push_str(&chunk);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Chat stream failed");
                        failed = true;
                        break;
                    }
                    None => break,
                }
            },
            Some(Err(e)) => {
                warn!(error = %e, "Chat request failed");
                failed = true;
            }
            None => {}
        }

        if failed {
            content = if content.trim().is_empty() {
                GENERIC_FAILURE_TEXT.to_string()
            } else {
                format!("{}\n\n{}", content.trim_end(), GENERIC_FAILURE_TEXT)
            };
            turn.write(
                message_id,
                MessageEdit::ReplaceContent {
                    content: content.clone(),
                },
            )
            .await?;
        } else if !turn.is_cancelled() {
            if let Some(parsed) = parse_directive(&content) {
                debug!(kind = ?parsed.directive.kind, "Reply carries a media directive");
                content = parsed.remaining_text;
                turn.write(
                    message_id,
                    MessageEdit::ReplaceContent {
                        content: content.clone(),
                    },
                )
                .await?;

                let kind = parsed.directive.kind;
                match turn
                    .run(generate_media(
                        self.backend.as_ref(),
                        config,
                        kind,
                        &parsed.directive.prompt,
                        attachments,
                    ))
                    .await
                {
                    Some(Ok(media)) => {
                        turn.write(message_id, MessageEdit::AttachMedia { media })
                            .await?;
                    }
                    Some(Err(e)) => {
                        warn!(kind = ?kind, error = %e, "Directive media generation failed");
                        content = if content.is_empty() {
                            kind.failure_text().to_string()
                        } else {
                            format!("{}\n\n{}", content, kind.failure_text())
                        };
                        turn.write(
                            message_id,
                            MessageEdit::ReplaceContent {
                                content: content.clone(),
                            },
                        )
                        .await?;
                    }
                    None => {}
                }
            }

            turn.record_exchange(ChatTurn::user(text, attachments.to_vec()), &content)
                .await;
        }

        Ok(())
    }

    /// Read a message of the active session aloud
    ///
    /// Starting an utterance interrupts the previous one.
    pub async fn speak(&self, message_id: &str) -> Result<SpokenMessage, AppError> {
        let (text, interrupted) = {
            let mut sessions = self.sessions.lock().await;
            let (session_id, text) = {
                let (session, message) = sessions
                    .find_message(message_id)
                    .ok_or_else(|| AppError::MessageNotFound(message_id.to_string()))?;
                (session.id.clone(), message.content.trim().to_string())
            };
            if session_id != sessions.active_id() {
                return Err(AppError::InvalidInput(
                    "Only messages of the active session can be read aloud".to_string(),
                ));
            }
            if text.is_empty() {
                return Err(AppError::InvalidInput("Message has no text to read".to_string()));
            }
            let interrupted = sessions.context_mut().begin_utterance(message_id);
            (text, interrupted)
        };

        if let Some(previous) = &interrupted {
            debug!(message_id = %previous.message_id, "Interrupted utterance");
        }

        let sample_rate = self.config.read().await.speech_sample_rate;
        let pcm = match self.backend.generate_speech(&text).await {
            Ok(pcm) => pcm,
            Err(e) => {
                let mut sessions = self.sessions.lock().await;
                if sessions
                    .context()
                    .current_utterance()
                    .is_some_and(|u| u.message_id == message_id)
                {
                    sessions.context_mut().stop_utterance();
                }
                return Err(e.into());
            }
        };

        let superseded = !self
            .sessions
            .lock()
            .await
            .context()
            .current_utterance()
            .is_some_and(|u| u.message_id == message_id);

        let audio = GeneratedMedia {
            mime_type: WAV_MIME_TYPE.to_string(),
            data: pcm_to_wav(&pcm, sample_rate),
        };
        Ok(SpokenMessage {
            message_id: message_id.to_string(),
            audio_url: audio.to_data_url(),
            interrupted,
            superseded,
        })
    }

    /// Stop the current utterance
    pub async fn stop_speaking(&self) -> Option<Utterance> {
        self.sessions.lock().await.context_mut().stop_utterance()
    }

    /// Retire this workspace: running turns are cancelled and nothing more
    /// is written to the store
    pub async fn close(&self) {
        let mut sessions = self.sessions.lock().await;
        sessions.context_mut().stop_utterance();
        sessions.close();
    }
}
