//! Synchronized history store over a single serialized collection.

use std::sync::Arc;

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::history::DownloadRecord;
use crate::types::TaskId;

/// Durable mapping from task id to [`DownloadRecord`]
///
/// The whole collection lives as one JSON array under `key` in the backing store. Every
/// operation holds one coarse lock across its complete read-modify-write, so concurrent
/// callers observe either the pre- or the post-mutation collection and no upsert is lost.
///
/// A stored value that fails to parse is treated as an empty history: reads return
/// nothing and the next mutation overwrites it.
pub struct HistoryRepository {
    store: Arc<dyn KeyValueStore>,
    key: String,
    lock: tokio::sync::Mutex<()>,
}

impl HistoryRepository {
    /// Create a repository storing its collection under `key`
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// All records, newest `created_at` first
    ///
    /// A stored value that does not parse reads as an empty history (logged, not
    /// returned); the next write replaces it.
    ///
    /// # Errors
    ///
    /// Failures of the backing [`KeyValueStore`] itself (I/O, a closed database) are
    /// returned unchanged. Only corrupt content degrades to empty.
    pub async fn get_all_sorted(&self) -> Result<Vec<DownloadRecord>> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Look up one record; an empty id is never found
    ///
    /// Corrupt stored content reads as "not found".
    ///
    /// # Errors
    ///
    /// Backing-store failures propagate, as for [`get_all_sorted`](Self::get_all_sorted).
    pub async fn find_by_task_id(&self, task_id: &TaskId) -> Result<Option<DownloadRecord>> {
        if task_id.as_str().trim().is_empty() {
            return Ok(None);
        }
        let _guard = self.lock.lock().await;
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| &r.task_id == task_id))
    }

    /// Insert the record, or replace the entry with the same task id
    pub async fn upsert(&self, record: DownloadRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        match records.iter_mut().find(|r| r.task_id == record.task_id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.save(&records).await
    }

    /// Apply `f` to the stored record and persist the result in the same critical section
    ///
    /// Returns `Ok(None)` without writing if no record has this id.
    pub async fn update<F, T>(&self, task_id: &TaskId, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut DownloadRecord) -> T,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let Some(record) = records.iter_mut().find(|r| &r.task_id == task_id) else {
            return Ok(None);
        };
        let out = f(record);
        self.save(&records).await?;
        Ok(Some(out))
    }

    /// Delete the record if present. Returns whether anything was removed.
    pub async fn remove(&self, task_id: &TaskId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| &r.task_id != task_id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records).await?;
        Ok(true)
    }

    /// Empty the whole history
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.delete(&self.key).await
    }

    /// Records still in a non-terminal status, newest first
    pub async fn find_unfinished(&self) -> Result<Vec<DownloadRecord>> {
        let mut records = self.get_all_sorted().await?;
        records.retain(|r| !r.is_terminal());
        Ok(records)
    }

    // Callers must hold `self.lock`.
    async fn load(&self) -> Result<Vec<DownloadRecord>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(
                    key = %self.key,
                    error = %e,
                    "stored history is unreadable, treating it as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, records: &[DownloadRecord]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.store.put(&self.key, &raw).await
    }
}

fn sort_newest_first(records: &mut [DownloadRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
