//! Durable checkpoint store: one JSON document per thread
//!
//! Appends rewrite the document through a temp file and a rename, so a
//! reader sees either the previous checkpoint or the new one, never a mix.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::agent::locks::ThreadLocks;
use crate::core::{Message, Result, ThreadId, TwinError};
use crate::store::CheckpointStore;

/// On-disk checkpoint document
#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    thread_id: ThreadId,
    /// Number of appends applied, bumped on every write
    version: u64,
    messages: Vec<Message>,
}

pub struct FileStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles per thread
    locks: ThreadLocks,
}

impl FileStore {
    /// Open (and create if needed) the store directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            TwinError::persistence(format!("Cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            locks: ThreadLocks::new(),
        })
    }

    fn path_for(&self, thread: &ThreadId) -> Result<PathBuf> {
        let id = thread.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TwinError::persistence(format!(
                "Thread id '{}' cannot be used as a file name",
                id
            )));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn read_checkpoint(&self, thread: &ThreadId) -> Result<Option<Checkpoint>> {
        let path = self.path_for(thread)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TwinError::persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            TwinError::persistence(format!("Corrupt checkpoint {}: {}", path.display(), e))
        })
    }

    async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path_for(&checkpoint.thread_id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(checkpoint)?;

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| TwinError::persistence(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            TwinError::persistence(format!("Failed to commit {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl CheckpointStore for FileStore {
    async fn load(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        Ok(self
            .read_checkpoint(thread)
            .await?
            .map(|c| c.messages)
            .unwrap_or_default())
    }

    async fn append(&self, thread: &ThreadId, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let _guard = self.locks.acquire(thread).await;
        let mut checkpoint = self.read_checkpoint(thread).await?.unwrap_or(Checkpoint {
            thread_id: thread.clone(),
            version: 0,
            messages: Vec::new(),
        });
        checkpoint.messages.extend_from_slice(messages);
        checkpoint.version += 1;

        self.write_checkpoint(&checkpoint).await?;
        tracing::trace!(thread = %thread, version = checkpoint.version, "checkpoint written");
        Ok(())
    }

    async fn threads(&self) -> Result<Vec<ThreadId>> {
        let mut entries = fs::read_dir(&self.dir).await.map_err(|e| {
            TwinError::persistence(format!("Failed to list {}: {}", self.dir.display(), e))
        })?;

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            TwinError::persistence(format!("Failed to list {}: {}", self.dir.display(), e))
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(ThreadId::from(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }
}
