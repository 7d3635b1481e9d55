//! SwiftMind Backend Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod services;
/// Key-value persistence
///
/// User registry and per-user session arrays stored as JSON blobs.
pub mod store;
