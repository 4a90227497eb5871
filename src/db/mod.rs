//! Durable key-value persistence for lite-dl
//!
//! The history repository only needs whole-value get/put/delete by string key, so the
//! storage seam is the small [`KeyValueStore`] trait. Two implementations ship with the
//! crate:
//! - [`Database`] - SQLite via `sqlx` (the durable default)
//! - [`MemoryStore`] - in-process map for tests and ephemeral use
//!
//! ## Submodules
//!
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`kv`] - `kv_store` table access

use crate::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;

mod kv;
mod migrations;

/// Opaque durable map of string to string
///
/// No transactions, no field-level updates: callers read and write whole values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Database handle for lite-dl
pub struct Database {
    pool: SqlitePool,
}

/// In-memory [`KeyValueStore`]
///
/// Contents are lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map; the panicking writer never left it half-updated
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
