//! API module
//!
//! HTTP request handlers and the router that wires them to paths.

pub mod auth;
pub mod chat;
pub mod handlers;
pub mod messages;
pub mod sessions;
pub mod streaming;
pub mod utils;

pub use utils::{AppState, RouterState};

use axum::{
    routing::{get, post, put},
    Router,
};

/// Routes for every `/api` endpoint except health
pub fn router(state: RouterState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Sessions
        .route(
            "/api/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route("/api/sessions/clear", post(sessions::clear_sessions))
        .route("/api/sessions/active/module", put(sessions::set_active_module))
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/api/sessions/:id/select", post(sessions::select_session))
        .route("/api/sessions/:id/title", put(sessions::rename_session))
        // Chat
        .route("/api/chat/send", post(chat::send_message))
        // Messages
        .route("/api/messages/:id/reaction", put(messages::set_reaction))
        .route("/api/messages/:id/feedback", put(messages::set_feedback))
        .route("/api/messages/:id/speak", post(messages::speak_message))
        .route("/api/speech/stop", post(messages::stop_speaking))
        // Formatting, modules and settings
        .route("/api/format", post(handlers::format_text))
        .route("/api/modules", get(handlers::list_modules))
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        .with_state(state)
}
