//! User registry and per-user session persistence
//!
//! Three record kinds live under fixed keys:
//! - `swiftmind_users`: array of [`UserProfile`]
//! - `swiftmind_current_user`: id of the logged-in user
//! - `swiftmind_sessions_<user_id>`: array of [`Session`]

use super::error::StoreError;
use super::kv::KeyValueStore;
use crate::chat::models::Session;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Key holding the user registry
pub const USERS_KEY: &str = "swiftmind_users";
/// Key holding the current-user pointer
pub const CURRENT_USER_KEY: &str = "swiftmind_current_user";
/// Prefix of the per-user session array keys
pub const SESSIONS_KEY_PREFIX: &str = "swiftmind_sessions_";

const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";

/// A locally registered user. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Email as first entered
    pub email: String,
    /// Avatar image URL
    pub avatar: String,
}

impl UserProfile {
    fn create(name: &str, email: &str) -> Self {
        let name = if name.trim().is_empty() {
            email.split('@').next().unwrap_or(email).to_string()
        } else {
            name.trim().to_string()
        };
        let avatar = reqwest::Url::parse_with_params(
            AVATAR_BASE_URL,
            &[("name", name.as_str()), ("background", "random")],
        )
        .map(|url| url.to_string())
        .unwrap_or_default();

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email: email.trim().to_string(),
            avatar,
        }
    }
}

/// Storage key of a user's session array
pub fn sessions_key(user_id: &str) -> String {
    format!("{}{}", SESSIONS_KEY_PREFIX, user_id)
}

/// Read/modify/write access to profiles and sessions
#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProfileStore {
    /// Wrap a key-value store
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await
    }

    /// Every registered user
    pub async fn users(&self) -> Result<Vec<UserProfile>, StoreError> {
        Ok(self.read_json(USERS_KEY).await?.unwrap_or_default())
    }

    /// Find-or-create a user by email (case-insensitive) and make it the
    /// current user
    pub async fn login(&self, name: &str, email: &str) -> Result<UserProfile, StoreError> {
        let mut users = self.users().await?;
        let wanted = email.trim().to_lowercase();

        let user = match users.iter().find(|u| u.email.to_lowercase() == wanted) {
            Some(existing) => {
                debug!(user_id = %existing.id, "Existing user logged in");
                existing.clone()
            }
            None => {
                let user = UserProfile::create(name, email);
                users.push(user.clone());
                self.write_json(USERS_KEY, &users).await?;
                info!(user_id = %user.id, "Registered new user");
                user
            }
        };

        self.kv.set(CURRENT_USER_KEY, &user.id).await?;
        Ok(user)
    }

    /// Clear the current-user pointer
    pub async fn logout(&self) -> Result<(), StoreError> {
        self.kv.remove(CURRENT_USER_KEY).await
    }

    /// The logged-in user, if the pointer resolves
    pub async fn current_user(&self) -> Result<Option<UserProfile>, StoreError> {
        match self.kv.get(CURRENT_USER_KEY).await? {
            Some(id) => self.find_user(&id).await,
            None => Ok(None),
        }
    }

    /// Look a user up by id
    pub async fn find_user(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users().await?.into_iter().find(|u| u.id == id))
    }

    /// Look a user up by email (case-insensitive)
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let wanted = email.trim().to_lowercase();
        Ok(self
            .users()
            .await?
            .into_iter()
            .find(|u| u.email.to_lowercase() == wanted))
    }

    /// All sessions of a user, deleted ones included
    pub async fn load_sessions(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .read_json(&sessions_key(user_id))
            .await?
            .unwrap_or_default())
    }

    /// Overwrite a user's session array
    pub async fn save_sessions(&self, user_id: &str, sessions: &[Session]) -> Result<(), StoreError> {
        self.write_json(&sessions_key(user_id), sessions).await
    }
}
