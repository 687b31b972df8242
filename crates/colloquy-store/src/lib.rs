//! Thread state storage.
//!
//! The store is the sole point of cross-turn memory: the engine loads a
//! thread's record at the start of an invocation and writes it back once
//! after a successful run. A load miss for a fresh id is not an error; a
//! read or parse failure for an existing thread is surfaced as-is, never
//! masked as a fresh thread.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colloquy_protocol::{ThreadId, ThreadRecord};
use parking_lot::{Mutex, RwLock};
use tokio::fs;
use tracing::{debug, instrument};

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Load a thread's record. `Ok(None)` means the thread does not exist
    /// yet; `Err` means the record exists but could not be read.
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ThreadRecord>>;

    /// Persist a thread's record, overwriting any previous version
    /// (last-write-wins). Concurrent saves for the same thread are
    /// serialized; a failed save leaves the previous record intact.
    async fn save(&self, record: &ThreadRecord) -> Result<()>;
}

/// File-backed store: one JSON document per thread under
/// `<root>/threads/<thread_id>.json`.
///
/// Writes go to a temp file first and are renamed into place, so a crash or
/// I/O failure mid-save never corrupts the previous record.
#[derive(Debug)]
pub struct FileThreadStore {
    root: PathBuf,
    write_locks: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileThreadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn record_path(&self, thread_id: &ThreadId) -> PathBuf {
        self.root
            .join("threads")
            .join(format!("{}.json", thread_id.as_str()))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create thread dir {parent:?}"))?;
        }
        Ok(())
    }

    fn lock_for(&self, thread_id: &ThreadId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.write_locks.lock();
        guard
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl ThreadStore for FileThreadStore {
    #[instrument(skip(self), fields(thread_id = %thread_id))]
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ThreadRecord>> {
        let path = self.record_path(thread_id);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed reading thread record {path:?}"))?;
        let record: ThreadRecord = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing thread record {path:?}"))?;
        debug!(messages = record.history.len(), "thread record loaded");
        Ok(Some(record))
    }

    #[instrument(skip(self, record), fields(thread_id = %record.thread_id))]
    async fn save(&self, record: &ThreadRecord) -> Result<()> {
        let path = self.record_path(&record.thread_id);
        Self::ensure_parent(&path).await?;

        let lock = self.lock_for(&record.thread_id);
        let _guard = lock.lock().await;

        let payload =
            serde_json::to_string_pretty(record).context("failed serializing thread record")?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, payload)
            .await
            .with_context(|| format!("failed writing thread record {tmp_path:?}"))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("failed replacing thread record {path:?}"))?;
        debug!("thread record saved");
        Ok(())
    }
}

/// In-memory store for tests and in-process clients.
#[derive(Debug, Default)]
pub struct MemoryThreadStore {
    records: RwLock<HashMap<ThreadId, ThreadRecord>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ThreadRecord>> {
        Ok(self.records.read().get(thread_id).cloned())
    }

    async fn save(&self, record: &ThreadRecord) -> Result<()> {
        self.records
            .write()
            .insert(record.thread_id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::Result;
    use colloquy_protocol::{Message, RunId, ThreadRecord};
    use serde_json::json;
    use tokio::fs;

    use crate::{FileThreadStore, MemoryThreadStore, ThreadStore};

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    fn record_with_checkpoint(thread_id: &str, checkpoint: serde_json::Value) -> ThreadRecord {
        let mut record = ThreadRecord::new(thread_id.into(), "echo".into());
        record.checkpoint = checkpoint;
        record
            .history
            .push(Message::human(RunId::from_string("r1"), "hello"));
        record
    }

    #[tokio::test]
    async fn load_miss_is_not_an_error() -> Result<()> {
        let root = unique_test_root("colloquy-store-miss");
        let store = FileThreadStore::new(&root);
        assert!(store.load(&"fresh".into()).await?.is_none());
        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn save_then_load_round_trips_checkpoint() -> Result<()> {
        let root = unique_test_root("colloquy-store-roundtrip");
        let store = FileThreadStore::new(&root);
        let record = record_with_checkpoint("t1", json!({ "graph": { "cursor": 3 } }));

        store.save(&record).await?;
        let loaded = store.load(&"t1".into()).await?.expect("record exists");
        assert_eq!(loaded.checkpoint, record.checkpoint);
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.agent_id.as_str(), "echo");

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn save_overwrites_last_write_wins() -> Result<()> {
        let root = unique_test_root("colloquy-store-overwrite");
        let store = FileThreadStore::new(&root);

        store
            .save(&record_with_checkpoint("t1", json!({ "turns": 1 })))
            .await?;
        store
            .save(&record_with_checkpoint("t1", json!({ "turns": 2 })))
            .await?;

        let loaded = store.load(&"t1".into()).await?.expect("record exists");
        assert_eq!(loaded.checkpoint, json!({ "turns": 2 }));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_record_surfaces_as_error() -> Result<()> {
        let root = unique_test_root("colloquy-store-corrupt");
        let store = FileThreadStore::new(&root);
        store
            .save(&record_with_checkpoint("t1", json!(null)))
            .await?;

        let path = root.join("threads").join("t1.json");
        fs::write(&path, "{ not json").await?;

        let error = store.load(&"t1".into()).await.unwrap_err();
        assert!(error.to_string().contains("failed parsing thread record"));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_saves_to_same_thread_leave_one_complete_record() -> Result<()> {
        let root = unique_test_root("colloquy-store-concurrent");
        let store = std::sync::Arc::new(FileThreadStore::new(&root));

        let mut handles = Vec::new();
        for turn in 0..8_u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(&record_with_checkpoint("t1", json!({ "turns": turn })))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task completes")?;
        }

        let loaded = store.load(&"t1".into()).await?.expect("record exists");
        let turns = loaded.checkpoint["turns"].as_u64().expect("complete record");
        assert!(turns < 8);

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn memory_store_round_trips() -> Result<()> {
        let store = MemoryThreadStore::new();
        assert!(store.load(&"t1".into()).await?.is_none());

        store
            .save(&record_with_checkpoint("t1", json!({ "turns": 1 })))
            .await?;
        let loaded = store.load(&"t1".into()).await?.expect("record exists");
        assert_eq!(loaded.checkpoint, json!({ "turns": 1 }));
        Ok(())
    }
}
