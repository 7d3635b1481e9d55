//! Orchestrator module
//!
//! Turns one user input into backend calls and session writes: module
//! dispatch, streamed replies, directive-driven media, per-file conversion
//! with its fallback, auto-titling and read-aloud.

pub mod config;
pub mod constants;
pub mod conversation;
mod conversion;
pub mod events;
pub mod media;
pub mod title;
mod turn;

pub use config::{validate_and_apply_config_update, ConfigUpdateRequest, OrchestratorConfig};
pub use conversation::{Orchestrator, SpokenMessage, TurnInput, TurnOutcome};
pub use events::{EventSink, TurnEvent};
