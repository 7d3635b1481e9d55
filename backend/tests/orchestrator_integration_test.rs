//! Integration tests for conversation turns
//!
//! These tests drive the orchestrator end to end against scripted fake
//! backends:
//! 1. Generic streaming and settlement
//! 2. Directive-driven media and its failures
//! 3. Media modules
//! 4. Per-file conversion with its fallback
//! 5. Cancellation by session and module switches
//! 6. Auto-titling
//! 7. Store failures and closed workspaces

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::stream;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use swiftmind_backend::api::AppState;
use swiftmind_backend::chat::context::ConversationContext;
use swiftmind_backend::chat::models::{
    Attachment, MediaKind, Message, MessageRole, Module, Session, DEFAULT_SESSION_TITLE,
};
use swiftmind_backend::chat::SessionManager;
use swiftmind_backend::error::AppError;
use swiftmind_backend::orchestrator::constants::{
    CONVERSION_CANCELLED_TEXT, CONVERSION_FAILURE_TEXT, GENERIC_FAILURE_TEXT,
};
use swiftmind_backend::orchestrator::title::fallback_title;
use swiftmind_backend::orchestrator::{
    EventSink, Orchestrator, OrchestratorConfig, TurnEvent, TurnInput, TurnOutcome,
};
use swiftmind_backend::services::{
    AspectRatio, BackendError, ConvertedFile, DocumentConverter, GeneratedMedia,
    GenerativeBackend, ImageSize, TextStream,
};
use swiftmind_backend::store::{KeyValueStore, MemoryStore, ProfileStore, StoreError};
use tokio::sync::RwLock;

/// How the fake answers `stream_chat`
#[derive(Clone)]
enum ChatScript {
    Chunks(Vec<&'static str>),
    FailOpen,
    FailAfter(Vec<&'static str>),
    Hang(Vec<&'static str>),
}

struct FakeBackend {
    chat: ChatScript,
    media_ok: bool,
    title: Option<&'static str>,
    complete_ok: bool,
    complete_calls: AtomicUsize,
    completed_files: StdMutex<Vec<String>>,
    media_prompts: StdMutex<Vec<(MediaKind, String)>>,
    video_images: StdMutex<Vec<Option<String>>>,
}

impl FakeBackend {
    fn new(chat: ChatScript) -> Self {
        Self {
            chat,
            media_ok: true,
            title: Some("Fake Title"),
            complete_ok: true,
            complete_calls: AtomicUsize::new(0),
            completed_files: StdMutex::new(Vec::new()),
            media_prompts: StdMutex::new(Vec::new()),
            video_images: StdMutex::new(Vec::new()),
        }
    }

    fn record(&self, kind: MediaKind, prompt: &str) {
        self.media_prompts
            .lock()
            .unwrap()
            .push((kind, prompt.to_string()));
    }

    fn media(&self, mime_type: &str) -> Result<GeneratedMedia, BackendError> {
        if self.media_ok {
            Ok(GeneratedMedia {
                mime_type: mime_type.to_string(),
                data: vec![1, 2, 3],
            })
        } else {
            Err(BackendError::Status {
                status: 500,
                body: "media backend down".to_string(),
            })
        }
    }
}

fn owned(chunks: &[&'static str]) -> Vec<Result<String, BackendError>> {
    chunks.iter().map(|c| Ok(c.to_string())).collect()
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    async fn stream_chat(
        &self,
        _context: &ConversationContext,
        _text: &str,
        _attachments: &[Attachment],
    ) -> Result<TextStream, BackendError> {
        match &self.chat {
            ChatScript::Chunks(chunks) => Ok(Box::pin(stream::iter(owned(chunks)))),
            ChatScript::FailOpen => Err(BackendError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
            ChatScript::FailAfter(chunks) => {
                let mut items = owned(chunks);
                items.push(Err(BackendError::Transport("connection reset".to_string())));
                Ok(Box::pin(stream::iter(items)))
            }
            ChatScript::Hang(chunks) => Ok(Box::pin(
                stream::iter(owned(chunks)).chain(stream::pending()),
            )),
        }
    }

    async fn complete(
        &self,
        _context: &ConversationContext,
        _text: &str,
        attachments: &[Attachment],
    ) -> Result<String, BackendError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let name = attachments
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_default();
        self.completed_files.lock().unwrap().push(name.clone());
        if self.complete_ok {
            Ok(format!("text of {}", name))
        } else {
            Err(BackendError::Timeout("fallback timed out".to_string()))
        }
    }

    async fn generate_title(&self, _first_message: &str) -> Result<String, BackendError> {
        self.title
            .map(str::to_string)
            .ok_or_else(|| BackendError::NoResult("no title".to_string()))
    }

    async fn generate_image(&self, prompt: &str, _size: ImageSize) -> Result<GeneratedMedia, BackendError> {
        self.record(MediaKind::Image, prompt);
        self.media("image/png")
    }

    async fn generate_video(
        &self,
        prompt: &str,
        _aspect_ratio: AspectRatio,
        image: Option<&Attachment>,
    ) -> Result<GeneratedMedia, BackendError> {
        self.record(MediaKind::Video, prompt);
        self.video_images
            .lock()
            .unwrap()
            .push(image.map(|a| a.name.clone()));
        self.media("video/mp4")
    }

    async fn generate_speech(&self, text: &str) -> Result<Vec<u8>, BackendError> {
        self.record(MediaKind::Audio, text);
        self.media("audio/pcm").map(|m| m.data)
    }
}

/// Converter that fails for the listed file names
struct FakeConverter {
    failing: Vec<&'static str>,
    calls: StdMutex<Vec<String>>,
}

impl FakeConverter {
    fn failing(failing: Vec<&'static str>) -> Self {
        Self {
            failing,
            calls: StdMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(&self, file: &Attachment) -> Result<ConvertedFile, BackendError> {
        self.calls.lock().unwrap().push(file.name.clone());
        if self.failing.contains(&file.name.as_str()) {
            return Err(BackendError::Status {
                status: 503,
                body: "conversion unavailable".to_string(),
            });
        }
        Ok(ConvertedFile {
            file_name: "converted.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            data: b"%PDF".to_vec(),
        })
    }
}

async fn orchestrator(
    backend: Arc<FakeBackend>,
    converter: Option<Arc<dyn DocumentConverter>>,
) -> Orchestrator {
    let store = ProfileStore::new(Arc::new(MemoryStore::new()));
    let user = store.login("Test", "test@example.com").await.unwrap();
    let sessions = SessionManager::open(store, &user.id).await.unwrap();
    Orchestrator::new(
        sessions,
        backend,
        converter,
        Arc::new(RwLock::new(OrchestratorConfig::default())),
    )
}

fn text(text: &str) -> TurnInput {
    TurnInput {
        text: text.to_string(),
        attachments: Vec::new(),
    }
}

fn file(name: &str, mime_type: &str) -> Attachment {
    Attachment {
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        data: BASE64.encode(name.as_bytes()),
    }
}

async fn send(orchestrator: &Orchestrator, input: TurnInput) -> (TurnOutcome, Vec<TurnEvent>) {
    let (sink, mut rx) = EventSink::channel();
    let outcome = orchestrator.send(input, &sink).await.unwrap();
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (outcome, events)
}

async fn active_session(orchestrator: &Orchestrator) -> Session {
    orchestrator
        .sessions()
        .lock()
        .await
        .active()
        .unwrap()
        .clone()
}

async fn set_module(orchestrator: &Orchestrator, module: Module) {
    orchestrator
        .sessions()
        .lock()
        .await
        .set_module(module)
        .await
        .unwrap();
}

fn reply(session: &Session, index: usize) -> &Message {
    &session.messages[index]
}

#[tokio::test]
async fn test_generic_reply_streams_in_order_and_settles_once() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Chunks(vec!["Hel", "lo ", "there"])));
    let orchestrator = orchestrator(backend, None).await;

    let (outcome, events) = send(&orchestrator, text("hi")).await;
    assert!(!outcome.cancelled);
    assert_eq!(outcome.reply_ids.len(), 1);

    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Chunk { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["Hel", "lo ", "there"]);

    let settled = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::Settled { .. }))
        .count();
    assert_eq!(settled, 1);
    assert!(matches!(events.last(), Some(TurnEvent::Settled { .. })));

    let session = active_session(&orchestrator).await;
    assert_eq!(session.messages.len(), 2);
    assert_eq!(reply(&session, 0).role, MessageRole::User);
    assert_eq!(reply(&session, 1).content, "Hello there");
    assert!(!reply(&session, 1).is_streaming());

    let history = orchestrator.sessions().lock().await.context().history().len();
    assert_eq!(history, 2);
}

#[tokio::test]
async fn test_directive_attaches_media_to_same_message() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Chunks(vec![
        "Here you go. ",
        "[[IMAGE: a red fox in snow]]",
    ])));
    let orchestrator = orchestrator(backend.clone(), None).await;

    send(&orchestrator, text("draw a fox")).await;

    let session = active_session(&orchestrator).await;
    let message = reply(&session, 1);
    assert_eq!(message.content, "Here you go.");
    let media = message.media.as_ref().unwrap();
    assert_eq!(media.kind, MediaKind::Image);
    assert_eq!(media.url, "data:image/png;base64,AQID");
    assert_eq!(
        backend.media_prompts.lock().unwrap().as_slice(),
        &[(MediaKind::Image, "a red fox in snow".to_string())]
    );
}

#[tokio::test]
async fn test_directive_failure_appends_failure_line() {
    let mut fake = FakeBackend::new(ChatScript::Chunks(vec!["Listen: [[speech: hello world]]"]));
    fake.media_ok = false;
    let orchestrator = orchestrator(Arc::new(fake), None).await;

    send(&orchestrator, text("say hello")).await;

    let session = active_session(&orchestrator).await;
    let message = reply(&session, 1);
    assert_eq!(message.content, "Listen:\n\nFailed to generate speech.");
    assert!(message.media.is_none());
    assert!(!message.is_streaming());
}

#[tokio::test]
async fn test_stream_error_keeps_partial_content() {
    let backend = Arc::new(FakeBackend::new(ChatScript::FailAfter(vec!["Partial answer"])));
    let orchestrator = orchestrator(backend, None).await;

    send(&orchestrator, text("hi")).await;

    let session = active_session(&orchestrator).await;
    assert_eq!(
        reply(&session, 1).content,
        format!("Partial answer\n\n{}", GENERIC_FAILURE_TEXT)
    );
    assert!(!reply(&session, 1).is_streaming());
}

#[tokio::test]
async fn test_failed_request_becomes_error_message() {
    let backend = Arc::new(FakeBackend::new(ChatScript::FailOpen));
    let orchestrator = orchestrator(backend, None).await;

    let (outcome, _) = send(&orchestrator, text("hi")).await;
    assert_eq!(outcome.reply_ids.len(), 1);

    let session = active_session(&orchestrator).await;
    assert_eq!(reply(&session, 1).content, GENERIC_FAILURE_TEXT);
    assert!(!reply(&session, 1).is_streaming());
    assert!(orchestrator.sessions().lock().await.context().history().is_empty());
}

#[tokio::test]
async fn test_media_modules_route_to_their_backend_call() {
    let backend = Arc::new(FakeBackend::new(ChatScript::FailOpen));
    let orchestrator = orchestrator(backend.clone(), None).await;

    set_module(&orchestrator, Module::ImageGenerator).await;
    send(&orchestrator, text("a lighthouse")).await;

    set_module(&orchestrator, Module::TextToSpeech).await;
    send(&orchestrator, text("read this")).await;

    set_module(&orchestrator, Module::VideoGenerator).await;
    let input = TurnInput {
        text: "animate it".to_string(),
        attachments: vec![file("sketch.pdf", "application/pdf"), file("cat.png", "image/png")],
    };
    send(&orchestrator, input).await;

    let session = active_session(&orchestrator).await;
    let image = reply(&session, 1).media.as_ref().unwrap();
    assert_eq!(image.kind, MediaKind::Image);

    let audio = reply(&session, 3).media.as_ref().unwrap();
    assert_eq!(audio.kind, MediaKind::Audio);
    let encoded = audio.url.strip_prefix("data:audio/wav;base64,").unwrap();
    let wav = BASE64.decode(encoded).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(wav.len(), 44 + 3);

    let video = reply(&session, 5).media.as_ref().unwrap();
    assert_eq!(video.kind, MediaKind::Video);
    assert_eq!(
        backend.video_images.lock().unwrap().as_slice(),
        &[Some("sketch.pdf".to_string())]
    );
}

#[tokio::test]
async fn test_media_module_failure_text() {
    let mut fake = FakeBackend::new(ChatScript::FailOpen);
    fake.media_ok = false;
    let orchestrator = orchestrator(Arc::new(fake), None).await;

    set_module(&orchestrator, Module::ImageGenerator).await;
    send(&orchestrator, text("a lighthouse")).await;
    set_module(&orchestrator, Module::VideoGenerator).await;
    send(&orchestrator, text("waves")).await;

    let session = active_session(&orchestrator).await;
    assert_eq!(reply(&session, 1).content, "Failed to generate image.");
    assert_eq!(reply(&session, 3).content, "Failed to generate video.");
    assert!(session.messages.iter().all(|m| !m.is_streaming()));
}

#[tokio::test]
async fn test_conversion_failure_falls_back_once_per_file() {
    let backend = Arc::new(FakeBackend::new(ChatScript::FailOpen));
    let converter = Arc::new(FakeConverter::failing(vec!["report.docx", "scan.png"]));
    let orchestrator = orchestrator(backend.clone(), Some(converter.clone())).await;
    set_module(&orchestrator, Module::Converter).await;

    let input = TurnInput {
        text: String::new(),
        attachments: vec![
            file("report.docx", "application/msword"),
            file("scan.png", "image/png"),
        ],
    };
    let (outcome, _) = send(&orchestrator, input).await;
    assert_eq!(outcome.reply_ids.len(), 2);

    assert_eq!(backend.complete_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        backend.completed_files.lock().unwrap().as_slice(),
        &["report.docx".to_string(), "scan.png".to_string()]
    );
    assert_eq!(
        converter.calls.lock().unwrap().as_slice(),
        &["report.docx".to_string(), "scan.png".to_string()]
    );

    let session = active_session(&orchestrator).await;
    let first = reply(&session, 1);
    assert_eq!(first.content, "Converted report.docx successfully.");
    let download = first.download.as_ref().unwrap();
    assert_eq!(download.file_name, "report.txt");
    assert_eq!(download.mime_type, "text/plain");
    assert_eq!(BASE64.decode(&download.data).unwrap(), b"text of report.docx");

    let second = reply(&session, 2).download.as_ref().unwrap();
    assert_eq!(second.file_name, "scan.txt");
}

#[tokio::test]
async fn test_conversion_success_skips_fallback_and_failures_do_not_abort() {
    let mut fake = FakeBackend::new(ChatScript::FailOpen);
    fake.complete_ok = false;
    let backend = Arc::new(fake);
    let converter = Arc::new(FakeConverter::failing(vec!["broken.pdf"]));
    let orchestrator = orchestrator(backend.clone(), Some(converter)).await;
    set_module(&orchestrator, Module::Converter).await;

    let input = TurnInput {
        text: "convert these".to_string(),
        attachments: vec![
            file("broken.pdf", "application/pdf"),
            file("photo.jpg", "image/jpeg"),
        ],
    };
    send(&orchestrator, input).await;

    assert_eq!(backend.complete_calls.load(Ordering::SeqCst), 1);

    let session = active_session(&orchestrator).await;
    assert_eq!(reply(&session, 1).content, CONVERSION_FAILURE_TEXT);
    assert!(reply(&session, 1).download.is_none());

    let converted = reply(&session, 2);
    assert_eq!(converted.content, "Converted photo.jpg successfully.");
    assert_eq!(
        converted.download.as_ref().unwrap().mime_type,
        "application/pdf"
    );
}

#[tokio::test]
async fn test_missing_converter_uses_fallback() {
    let backend = Arc::new(FakeBackend::new(ChatScript::FailOpen));
    let orchestrator = orchestrator(backend.clone(), None).await;
    set_module(&orchestrator, Module::Converter).await;

    let input = TurnInput {
        text: String::new(),
        attachments: vec![file("notes.odt", "application/vnd.oasis.opendocument.text")],
    };
    send(&orchestrator, input).await;

    assert_eq!(backend.complete_calls.load(Ordering::SeqCst), 1);
    let session = active_session(&orchestrator).await;
    assert_eq!(
        reply(&session, 1).download.as_ref().unwrap().file_name,
        "notes.txt"
    );
}

#[tokio::test]
async fn test_converter_without_files_uses_generic_path() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Chunks(vec!["Attach a file first."])));
    let orchestrator = orchestrator(backend.clone(), None).await;
    set_module(&orchestrator, Module::Converter).await;

    send(&orchestrator, text("convert please")).await;

    assert_eq!(backend.complete_calls.load(Ordering::SeqCst), 0);
    let session = active_session(&orchestrator).await;
    assert_eq!(reply(&session, 1).content, "Attach a file first.");
}

#[tokio::test]
async fn test_session_switch_cancels_turn_and_drops_stale_writes() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Hang(vec!["partial"])));
    let orchestrator = Arc::new(orchestrator(backend, None).await);
    let original = active_session(&orchestrator).await.id;

    let (sink, mut rx) = EventSink::channel();
    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.send(text("hi"), &sink).await })
    };

    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::Chunk { .. }) {
            break;
        }
    }

    orchestrator.sessions().lock().await.create().await.unwrap();
    let outcome = runner.await.unwrap().unwrap();
    assert!(outcome.cancelled);
    assert_eq!(outcome.session_id, original);

    let sessions = orchestrator.sessions().lock().await;
    let old = sessions.get(&original).unwrap();
    assert_eq!(old.messages.len(), 2);
    assert_eq!(old.messages[1].content, "partial");
    assert!(!old.messages[1].is_streaming());

    let active = sessions.active().unwrap();
    assert_ne!(active.id, original);
    assert!(active.messages.is_empty());
    assert!(sessions.context().history().is_empty());
}

#[tokio::test]
async fn test_module_switch_cancels_turn() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Hang(vec![])));
    let orchestrator = Arc::new(orchestrator(backend, None).await);

    let (sink, mut rx) = EventSink::channel();
    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.send(text("hi"), &sink).await })
    };

    // user message, then the streaming model message
    let mut appended = 0;
    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::MessageAppended { .. }) {
            appended += 1;
            if appended == 2 {
                break;
            }
        }
    }

    set_module(&orchestrator, Module::Summarizer).await;
    let outcome = runner.await.unwrap().unwrap();
    assert!(outcome.cancelled);

    let session = active_session(&orchestrator).await;
    assert_eq!(session.messages[1].content, "");
    assert!(!session.messages[1].is_streaming());
}

#[tokio::test]
async fn test_first_message_titles_session() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Chunks(vec!["ok"])));
    let orchestrator = orchestrator(backend, None).await;

    let (outcome, _) = send(&orchestrator, text("plan my week")).await;
    outcome.title_task.unwrap().await.unwrap();
    assert_eq!(active_session(&orchestrator).await.title, "Fake Title");

    let (outcome, _) = send(&orchestrator, text("and the weekend")).await;
    assert!(outcome.title_task.is_none());
}

#[tokio::test]
async fn test_title_falls_back_to_message_text_and_lands_after_switch() {
    let mut fake = FakeBackend::new(ChatScript::Chunks(vec!["ok"]));
    fake.title = None;
    let orchestrator = orchestrator(Arc::new(fake), None).await;
    let original = active_session(&orchestrator).await.id;
    let message = "Compare three laptops for travel. Battery life matters most.";

    let (outcome, _) = send(&orchestrator, text(message)).await;
    orchestrator.sessions().lock().await.create().await.unwrap();
    outcome.title_task.unwrap().await.unwrap();

    let sessions = orchestrator.sessions().lock().await;
    assert_eq!(sessions.get(&original).unwrap().title, fallback_title(message));
    assert_eq!(
        sessions.get(&original).unwrap().title,
        "Compare three laptops for travel."
    );
    assert_eq!(sessions.active().unwrap().title, DEFAULT_SESSION_TITLE);
}

#[tokio::test]
async fn test_invalid_input_writes_nothing() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Chunks(vec!["ok"])));
    let orchestrator = orchestrator(backend, None).await;

    let (sink, _rx) = EventSink::channel();
    assert!(orchestrator.send(text("   "), &sink).await.is_err());
    assert!(active_session(&orchestrator).await.messages.is_empty());
}

/// Converter that never answers
struct StalledConverter;

#[async_trait]
impl DocumentConverter for StalledConverter {
    async fn convert(&self, _file: &Attachment) -> Result<ConvertedFile, BackendError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancelled_conversion_does_not_keep_progress_text() {
    let backend = Arc::new(FakeBackend::new(ChatScript::FailOpen));
    let orchestrator = Arc::new(orchestrator(backend.clone(), Some(Arc::new(StalledConverter))).await);
    set_module(&orchestrator, Module::Converter).await;

    let (sink, mut rx) = EventSink::channel();
    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        let input = TurnInput {
            text: String::new(),
            attachments: vec![file("report.docx", "application/msword")],
        };
        tokio::spawn(async move { orchestrator.send(input, &sink).await })
    };

    let mut appended = 0;
    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::MessageAppended { .. }) {
            appended += 1;
            if appended == 2 {
                break;
            }
        }
    }

    set_module(&orchestrator, Module::General).await;
    let outcome = runner.await.unwrap().unwrap();
    assert!(outcome.cancelled);
    assert_eq!(backend.complete_calls.load(Ordering::SeqCst), 0);

    let session = active_session(&orchestrator).await;
    assert_eq!(reply(&session, 1).content, CONVERSION_CANCELLED_TEXT);
    assert!(!reply(&session, 1).is_streaming());
}

/// Memory store that refuses writes once its budget is spent
struct BudgetStore {
    inner: MemoryStore,
    writes_left: AtomicUsize,
}

impl BudgetStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }
}

#[async_trait]
impl KeyValueStore for BudgetStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }
}

/// Orchestrator whose store accepts exactly two more writes: the user
/// message and the model message of the next turn
async fn orchestrator_with_failing_store(
    backend: Arc<FakeBackend>,
    module: Module,
) -> (Orchestrator, Arc<BudgetStore>) {
    let kv = Arc::new(BudgetStore::new());
    let store = ProfileStore::new(kv.clone());
    let user = store.login("Test", "test@example.com").await.unwrap();
    let sessions = SessionManager::open(store, &user.id).await.unwrap();
    let orchestrator = Orchestrator::new(
        sessions,
        backend,
        None,
        Arc::new(RwLock::new(OrchestratorConfig::default())),
    );
    {
        let mut sessions = orchestrator.sessions().lock().await;
        let session_id = sessions.active_id().to_string();
        sessions.rename(&session_id, "Titled").await.unwrap();
        sessions.set_module(module).await.unwrap();
    }
    kv.writes_left.store(2, Ordering::SeqCst);
    (orchestrator, kv)
}

#[tokio::test]
async fn test_store_failure_mid_stream_still_settles_reply() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Chunks(vec!["echo: ", "hi"])));
    let (orchestrator, _kv) = orchestrator_with_failing_store(backend, Module::General).await;

    let (sink, _rx) = EventSink::channel();
    let result = orchestrator.send(text("hi"), &sink).await;
    assert!(matches!(result, Err(AppError::Store(_))));

    let session = active_session(&orchestrator).await;
    assert_eq!(session.messages.len(), 2);
    let reply = reply(&session, 1);
    assert_eq!(reply.role, MessageRole::Model);
    assert!(!reply.is_streaming());
    assert_eq!(reply.content, "");
}

#[tokio::test]
async fn test_store_failure_in_media_and_conversion_still_settles() {
    for module in [Module::ImageGenerator, Module::Converter] {
        let backend = Arc::new(FakeBackend::new(ChatScript::FailOpen));
        let (orchestrator, _kv) = orchestrator_with_failing_store(backend, module).await;

        let input = TurnInput {
            text: "a lighthouse".to_string(),
            attachments: vec![file("scan.png", "image/png")],
        };
        let (sink, _rx) = EventSink::channel();
        let result = orchestrator.send(input, &sink).await;
        assert!(matches!(result, Err(AppError::Store(_))), "{:?}", module);

        let session = active_session(&orchestrator).await;
        assert_eq!(session.messages.len(), 2, "{:?}", module);
        assert!(
            session.messages.iter().all(|m| !m.is_streaming()),
            "{:?}",
            module
        );
    }
}

#[tokio::test]
async fn test_logout_stops_running_turn_from_overwriting_sessions() {
    let backend = Arc::new(FakeBackend::new(ChatScript::Hang(vec!["partial"])));
    let state = AppState::new(
        ProfileStore::new(Arc::new(MemoryStore::new())),
        backend,
        None,
        OrchestratorConfig::default(),
    );
    let user = state.profiles.login("Test", "test@example.com").await.unwrap();
    let old = state.open_workspace(&user).await.unwrap();
    let original = active_session(&old).await.id;

    let (sink, mut rx) = EventSink::channel();
    let runner = {
        let old = Arc::clone(&old);
        tokio::spawn(async move { old.send(text("hi"), &sink).await })
    };
    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::Chunk { .. }) {
            break;
        }
    }

    state.close_workspace().await;
    let outcome = runner.await.unwrap().unwrap();
    assert!(outcome.cancelled);
    if let Some(task) = outcome.title_task {
        task.await.unwrap();
    }

    let current = state.open_workspace(&user).await.unwrap();
    assert!(!Arc::ptr_eq(&old, &current));
    let created = current.sessions().lock().await.create().await.unwrap();

    let stored = state.profiles.load_sessions(&user.id).await.unwrap();
    assert!(stored.iter().any(|s| s.id == created.id));
    let earlier = stored.iter().find(|s| s.id == original).unwrap();
    assert_eq!(earlier.messages[1].content, "partial");
    assert!(!earlier.messages[1].is_streaming());
}
