//! Credential re-prompt
//!
//! When the generative backend rejects the API key the client asks a
//! [`CredentialPrompt`] for a replacement once, then retries the request a
//! single time.

use async_trait::async_trait;

/// Source of a replacement API key after an authentication failure
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Ask for a new key. `rejected` is the key that just failed.
    ///
    /// # Returns
    /// * `None` when no different key is available (no retry happens)
    async fn request_new_key(&self, rejected: &str) -> Option<String>;
}

/// Never offers a replacement
pub struct NoCredentialPrompt;

#[async_trait]
impl CredentialPrompt for NoCredentialPrompt {
    async fn request_new_key(&self, _rejected: &str) -> Option<String> {
        None
    }
}

/// Re-reads an environment variable, so an operator can rotate the key
/// without restarting the server
pub struct EnvCredentialPrompt {
    var: String,
}

impl EnvCredentialPrompt {
    /// Prompt backed by the given environment variable
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialPrompt for EnvCredentialPrompt {
    async fn request_new_key(&self, rejected: &str) -> Option<String> {
        let key = std::env::var(&self.var).ok()?;
        let key = key.trim();
        if key.is_empty() || key == rejected {
            tracing::warn!(var = %self.var, "No replacement API key available");
            return None;
        }
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_env_prompt_offers_only_a_different_key() {
        let var = "SWIFTMIND_TEST_ROTATED_KEY";
        let prompt = EnvCredentialPrompt::new(var);

        std::env::remove_var(var);
        assert!(prompt.request_new_key("old").await.is_none());

        std::env::set_var(var, "old");
        assert!(prompt.request_new_key("old").await.is_none());

        std::env::set_var(var, "new");
        assert_eq!(prompt.request_new_key("old").await.as_deref(), Some("new"));
        std::env::remove_var(var);
    }

    #[tokio::test]
    async fn test_no_prompt_never_offers() {
        assert!(NoCredentialPrompt.request_new_key("k").await.is_none());
    }
}
