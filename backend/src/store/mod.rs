//! Local profile store
//!
//! Key-value persistence for the user registry, the current-user pointer and
//! the per-user session lists. Values are JSON blobs; there are no
//! transactions and a single writer is assumed.

pub mod error;
pub mod kv;
pub mod profiles;
pub mod sqlite;

pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryStore};
pub use profiles::{ProfileStore, UserProfile};
pub use sqlite::SqliteStore;
