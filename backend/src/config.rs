//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;

/// Default Gemini API base URL
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default iLovePDF API base URL
pub const ILOVEPDF_API_BASE_URL: &str = "https://api.ilovepdf.com/v1";

/// Environment variable holding the Gemini API key
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Generative backend configuration
    pub gemini: GeminiConfig,
    /// Document conversion configuration
    pub conversion: ConversionConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Which key-value engine backs the profile store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite file under the data directory
    Sqlite,
    /// Process memory; nothing survives a restart
    Memory,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Base directory for stored data
    pub data_dir: String,
    /// Store engine
    pub store_backend: StoreBackend,
}

impl PersistenceConfig {
    /// Path of the SQLite store file
    pub fn store_path(&self) -> String {
        format!("{}/swiftmind.db", self.data_dir)
    }
}

/// Generative backend configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key (may be empty; the first call then triggers the re-prompt)
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// Text chat model
    pub chat_model: String,
    /// Image model
    pub image_model: String,
    /// Video model
    pub video_model: String,
    /// Speech model
    pub speech_model: String,
    /// Prebuilt voice used for speech
    pub voice_name: String,
    /// Delay between video operation polls (seconds)
    pub video_poll_interval_secs: u64,
    /// Maximum number of video operation polls
    pub video_max_polls: u32,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: GEMINI_API_BASE_URL.to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            image_model: "imagen-4.0-generate-001".to_string(),
            video_model: "veo-3.0-fast-generate-001".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice_name: "Kore".to_string(),
            video_poll_interval_secs: 10,
            video_max_polls: 60,
            request_timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .field("speech_model", &self.speech_model)
            .field("voice_name", &self.voice_name)
            .field("video_poll_interval_secs", &self.video_poll_interval_secs)
            .field("video_max_polls", &self.video_max_polls)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Document conversion configuration
#[derive(Clone)]
pub struct ConversionConfig {
    /// Public key; conversion is disabled without one
    pub public_key: Option<String>,
    /// API base URL
    pub api_base_url: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            api_base_url: ILOVEPDF_API_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("public_key", &self.public_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(var: &str, default: String) -> String {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let gemini_defaults = GeminiConfig::default();
        let conversion_defaults = ConversionConfig::default();

        Self {
            server: ServerConfig {
                port: env_or("PORT", 8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            persistence: PersistenceConfig {
                data_dir: env::var("DATA_DIR").unwrap_or_else(|_| {
                    // Default to ~/.swiftmind or current directory
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.swiftmind", home.to_string_lossy())
                    } else {
                        ".swiftmind".to_string()
                    }
                }),
                store_backend: match env::var("STORE_BACKEND").as_deref() {
                    Ok("memory") => StoreBackend::Memory,
                    _ => StoreBackend::Sqlite,
                },
            },
            gemini: GeminiConfig {
                api_key: env::var(GEMINI_API_KEY_VAR).unwrap_or_default(),
                base_url: env_string("GEMINI_API_BASE_URL", gemini_defaults.base_url),
                chat_model: env_string("GEMINI_CHAT_MODEL", gemini_defaults.chat_model),
                image_model: env_string("GEMINI_IMAGE_MODEL", gemini_defaults.image_model),
                video_model: env_string("GEMINI_VIDEO_MODEL", gemini_defaults.video_model),
                speech_model: env_string("GEMINI_SPEECH_MODEL", gemini_defaults.speech_model),
                voice_name: env_string("GEMINI_VOICE", gemini_defaults.voice_name),
                video_poll_interval_secs: env_or(
                    "VIDEO_POLL_INTERVAL_SECS",
                    gemini_defaults.video_poll_interval_secs,
                ),
                video_max_polls: env_or("VIDEO_MAX_POLLS", gemini_defaults.video_max_polls),
                request_timeout_secs: env_or(
                    "REQUEST_TIMEOUT_SECS",
                    gemini_defaults.request_timeout_secs,
                ),
            },
            conversion: ConversionConfig {
                public_key: env::var("ILOVEPDF_PUBLIC_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
                api_base_url: env_string("ILOVEPDF_API_BASE_URL", conversion_defaults.api_base_url),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults_and_overrides() {
        env::remove_var("PORT");
        env::remove_var("ILOVEPDF_PUBLIC_KEY");
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("GEMINI_CHAT_MODEL", "gemini-test");

        let config = Config::from_env();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.persistence.store_backend, StoreBackend::Memory);
        assert_eq!(config.gemini.chat_model, "gemini-test");
        assert!(config.conversion.public_key.is_none());

        env::remove_var("STORE_BACKEND");
        env::remove_var("GEMINI_CHAT_MODEL");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = GeminiConfig {
            api_key: "secret-key".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-key"));
        assert!(printed.contains("<redacted>"));
    }
}
