//! Gemini API client
//!
//! Direct HTTP client for the Gemini family: streamed and one-shot text,
//! titles, Imagen images, Veo videos (long-running operation, polled) and
//! TTS speech.
//!
//! Authentication failures get exactly one retry, after asking the
//! configured [`CredentialPrompt`] for a new key.

use super::backend::{
    AspectRatio, BackendError, GeneratedMedia, GenerativeBackend, ImageSize, TextStream,
};
use super::credentials::CredentialPrompt;
use super::gemini_types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ImageParameters, ImagePredictRequest, ImagePredictResponse, Operation, Part,
    PrebuiltVoiceConfig, PromptInstance, SpeechConfig, VideoImage, VideoInstance,
    VideoParameters, VideoPredictRequest, VoiceConfig,
};
use crate::chat::context::ConversationContext;
use crate::chat::models::{Attachment, MessageRole};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::StreamExt;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Marker the API uses for a key that does not grant access to the entity
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Gemini HTTP client
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
    api_key: RwLock<String>,
    credentials: Arc<dyn CredentialPrompt>,
}

impl GeminiClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `http` - Shared HTTP client (connection pooling)
    /// * `config` - Models, endpoints and key
    /// * `credentials` - Source of a replacement key after an auth failure
    pub fn new(
        http: reqwest::Client,
        config: GeminiConfig,
        credentials: Arc<dyn CredentialPrompt>,
    ) -> Self {
        let api_key = RwLock::new(config.api_key.clone());
        Self {
            http,
            config,
            api_key,
            credentials,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
        }
    }

    async fn send_once<B: Serialize + Sync>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        key: &str,
    ) -> Result<reqwest::Response, BackendError> {
        if key.is_empty() {
            return Err(BackendError::Auth("API key is empty".to_string()));
        }

        let url = self.url(endpoint);
        tracing::debug!(method = %method, url = %url, "Calling Gemini API");

        let mut request = self
            .http
            .request(method, &url)
            .query(&[("key", key)])
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        check_status(response).await
    }

    /// Send a request; on an auth failure ask for a new key and retry once
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, BackendError> {
        let key = self.api_key.read().await.clone();
        match self
            .send_once(method.clone(), endpoint, query, body, &key)
            .await
        {
            Err(BackendError::Auth(reason)) => {
                tracing::warn!(reason = %reason, "Gemini rejected the API key, re-prompting");
                let Some(new_key) = self.credentials.request_new_key(&key).await else {
                    return Err(BackendError::Auth(reason));
                };
                *self.api_key.write().await = new_key.clone();
                self.send_once(method, endpoint, query, body, &new_key).await
            }
            other => other,
        }
    }

    fn content_request(
        &self,
        context: &ConversationContext,
        text: &str,
        attachments: &[Attachment],
    ) -> GenerateContentRequest {
        let mut contents: Vec<Content> = context
            .history()
            .iter()
            .map(|turn| turn_content(turn.role, &turn.text, &turn.attachments))
            .collect();
        contents.push(turn_content(MessageRole::User, text, attachments));

        GenerateContentRequest {
            contents,
            system_instruction: Some(Content::text(None, context.system_instruction())),
            generation_config: None,
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let endpoint = format!("models/{}:generateContent", model);
        let response = self
            .send(Method::POST, &endpoint, &[], Some(request))
            .await?;
        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::Parse(format!("{} - Response body: {}", e, body))
        })?;
        if let Some(reason) = parsed.block_reason() {
            return Err(BackendError::NoResult(format!(
                "Gemini API blocked the prompt: {}",
                reason
            )));
        }
        Ok(parsed)
    }

    async fn poll_operation(&self, mut operation: Operation) -> Result<Operation, BackendError> {
        let interval = Duration::from_secs(self.config.video_poll_interval_secs);
        let mut polls = 0;

        while !operation.done {
            if polls >= self.config.video_max_polls {
                return Err(BackendError::Timeout(format!(
                    "video operation {} still running after {} polls",
                    operation.name, polls
                )));
            }
            tokio::time::sleep(interval).await;
            polls += 1;

            let response = self
                .send::<()>(Method::GET, &operation.name, &[], None)
                .await?;
            operation = response.json().await?;
            tracing::debug!(operation = %operation.name, polls, done = operation.done, "Polled video operation");
        }

        Ok(operation)
    }
}

fn turn_content(role: MessageRole, text: &str, attachments: &[Attachment]) -> Content {
    let role = match role {
        MessageRole::Model => "model",
        _ => "user",
    };
    let mut parts: Vec<Part> = attachments
        .iter()
        .map(|a| Part::inline(a.mime_type.clone(), a.data.clone()))
        .collect();
    if !text.trim().is_empty() || parts.is_empty() {
        parts.push(Part::text(text));
    }
    Content {
        role: Some(role.to_string()),
        parts,
    }
}

/// Map non-success statuses onto [`BackendError`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());

    tracing::error!(
        status_code = status_code,
        error_body = %body,
        "Gemini API returned error status"
    );

    if status_code == 401 || status_code == 403 || body.contains(ENTITY_NOT_FOUND) {
        return Err(BackendError::Auth(format!("HTTP {}: {}", status_code, body)));
    }
    Err(BackendError::Status {
        status: status_code,
        body,
    })
}

/// Parse one SSE line into the text it carries
fn parse_sse_line(line: &str) -> Result<Option<String>, BackendError> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let event: GenerateContentResponse = serde_json::from_str(data)?;
    if let Some(reason) = event.block_reason() {
        return Err(BackendError::NoResult(format!(
            "Gemini API blocked the prompt: {}",
            reason
        )));
    }
    let text = event.text();
    Ok((!text.is_empty()).then_some(text))
}

/// Turn an `alt=sse` response body into a stream of text chunks
fn sse_text_stream(response: reqwest::Response) -> TextStream {
    let mut bytes = Box::pin(response.bytes_stream());

    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(BackendError::from(e));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match parse_sse_line(&String::from_utf8_lossy(&buffer)) {
            Ok(Some(text)) => yield Ok(text),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    };

    Box::pin(stream)
}

fn clean_title(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string()
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn stream_chat(
        &self,
        context: &ConversationContext,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<TextStream, BackendError> {
        let request = self.content_request(context, text, attachments);
        let endpoint = format!("models/{}:streamGenerateContent", self.config.chat_model);

        tracing::debug!(
            model = %self.config.chat_model,
            history = context.history().len(),
            attachments = attachments.len(),
            "Starting streamed chat"
        );

        let response = self
            .send(Method::POST, &endpoint, &[("alt", "sse")], Some(&request))
            .await?;
        Ok(sse_text_stream(response))
    }

    async fn complete(
        &self,
        context: &ConversationContext,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<String, BackendError> {
        let request = self.content_request(context, text, attachments);
        let text = self
            .generate_content(&self.config.chat_model, &request)
            .await?
            .text();
        if text.trim().is_empty() {
            return Err(BackendError::NoResult("Gemini API response text is empty".to_string()));
        }
        Ok(text)
    }

    async fn generate_title(&self, first_message: &str) -> Result<String, BackendError> {
        let prompt = format!(
            "Generate a short title (at most 5 words) for a chat that starts with the \
             message below. Reply with the title only, without quotes.\n\n{}",
            first_message
        );
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: None,
        };
        let title = clean_title(
            &self
                .generate_content(&self.config.chat_model, &request)
                .await?
                .text(),
        );
        if title.is_empty() {
            return Err(BackendError::NoResult("Empty title from model".to_string()));
        }
        Ok(title)
    }

    async fn generate_image(&self, prompt: &str, size: ImageSize) -> Result<GeneratedMedia, BackendError> {
        let request = ImagePredictRequest {
            instances: vec![PromptInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImageParameters {
                sample_count: 1,
                aspect_ratio: size.aspect_ratio().to_string(),
            },
        };
        let endpoint = format!("models/{}:predict", self.config.image_model);
        let response: ImagePredictResponse = self
            .send(Method::POST, &endpoint, &[], Some(&request))
            .await?
            .json()
            .await?;

        let prediction = response
            .predictions
            .into_iter()
            .find(|p| p.bytes_base64_encoded.is_some())
            .ok_or_else(|| BackendError::NoResult("no image in response".to_string()))?;
        let data = BASE64.decode(prediction.bytes_base64_encoded.unwrap_or_default())?;

        Ok(GeneratedMedia {
            mime_type: prediction.mime_type.unwrap_or_else(|| "image/png".to_string()),
            data,
        })
    }

    async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        image: Option<&Attachment>,
    ) -> Result<GeneratedMedia, BackendError> {
        let request = VideoPredictRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
                image: image.map(|a| VideoImage {
                    bytes_base64_encoded: a.data.clone(),
                    mime_type: a.mime_type.clone(),
                }),
            }],
            parameters: VideoParameters {
                aspect_ratio: aspect_ratio.as_str().to_string(),
            },
        };
        let endpoint = format!("models/{}:predictLongRunning", self.config.video_model);
        let operation: Operation = self
            .send(Method::POST, &endpoint, &[], Some(&request))
            .await?
            .json()
            .await?;
        tracing::info!(operation = %operation.name, "Video generation started");

        let operation = self.poll_operation(operation).await?;
        if let Some(error) = &operation.error {
            return Err(BackendError::Status {
                status: error.code.unwrap_or(500) as u16,
                body: error.message.clone(),
            });
        }
        let uri = operation
            .video_uri()
            .ok_or_else(|| BackendError::NoResult("operation finished without a video".to_string()))?
            .to_string();

        let data = self
            .send::<()>(Method::GET, &uri, &[], None)
            .await?
            .bytes()
            .await?
            .to_vec();

        Ok(GeneratedMedia {
            mime_type: "video/mp4".to_string(),
            data,
        })
    }

    async fn generate_speech(&self, text: &str) -> Result<Vec<u8>, BackendError> {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), text)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.voice_name.clone(),
                        },
                    },
                }),
                ..Default::default()
            }),
        };
        let response = self
            .generate_content(&self.config.speech_model, &request)
            .await?;
        let audio = response
            .inline_data()
            .ok_or_else(|| BackendError::NoResult("no audio in response".to_string()))?;
        Ok(BASE64.decode(&audio.data)?)
    }
}
