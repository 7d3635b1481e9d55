//! Session auto-titling
//!
//! The first user message of an untitled session asks the backend for a
//! title in the background. The result is written by session id whenever it
//! arrives, even if the user has moved on.

use crate::chat::manager::SessionManager;
use crate::services::GenerativeBackend;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const MAX_SENTENCE_TITLE_LEN: usize = 60;
const MAX_TRUNCATED_TITLE_LEN: usize = 50;
const TRUNCATED_TITLE_KEEP: usize = 47;

/// Title derived from the message itself
///
/// The first sentence when it is short enough, otherwise the first 47
/// characters followed by `...`.
pub fn fallback_title(content: &str) -> String {
    let trimmed = content.trim();

    if let Some(sentence_end) = trimmed.find(['.', '!', '?']) {
        let sentence = trimmed[..=sentence_end].trim();
        if !sentence.is_empty() && sentence.chars().count() <= MAX_SENTENCE_TITLE_LEN {
            return sentence.to_string();
        }
    }

    if trimmed.chars().count() > MAX_TRUNCATED_TITLE_LEN {
        let head: String = trimmed.chars().take(TRUNCATED_TITLE_KEEP).collect();
        format!("{}...", head.trim_end())
    } else {
        trimmed.to_string()
    }
}

/// Generate a title in the background and rename the session with it
pub(crate) fn spawn_title(
    sessions: Arc<Mutex<SessionManager>>,
    backend: Arc<dyn GenerativeBackend>,
    session_id: String,
    first_message: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let title = match backend.generate_title(&first_message).await {
            Ok(title) => title,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Title generation failed, using message text");
                fallback_title(&first_message)
            }
        };

        match sessions.lock().await.rename(&session_id, &title).await {
            Ok(()) => debug!(session_id = %session_id, title = %title, "Session titled"),
            Err(e) => warn!(session_id = %session_id, error = %e, "Failed to store session title"),
        }
    })
}
