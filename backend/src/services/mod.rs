//! Service layer for external collaborators
//!
//! Traits for the generative and document-conversion backends, their HTTP
//! clients, and the small encoders the orchestrator needs around them.

pub mod audio;
pub mod backend;
pub mod converter;
pub mod credentials;
pub mod gemini;
pub mod gemini_types;

pub use backend::{
    AspectRatio, BackendError, ConvertedFile, DocumentConverter, GeneratedMedia,
    GenerativeBackend, ImageSize, TextStream,
};
pub use converter::IlovePdfClient;
pub use credentials::{CredentialPrompt, EnvCredentialPrompt, NoCredentialPrompt};
pub use gemini::GeminiClient;
