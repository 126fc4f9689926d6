//! Checkpoint store - persisted message history per thread
//!
//! A thread's history is append-only: `append` adds a batch atomically and
//! nothing ever edits or removes committed messages.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{StoreBackend, StoreConfig};
use crate::core::{Message, Result, ThreadId};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Backing store for thread checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load a thread's history; unknown threads have an empty history
    async fn load(&self, thread: &ThreadId) -> Result<Vec<Message>>;

    /// Append a batch of messages; the whole batch lands or none of it does
    async fn append(&self, thread: &ThreadId, messages: &[Message]) -> Result<()>;

    /// List known threads
    async fn threads(&self) -> Result<Vec<ThreadId>>;
}

/// Open the backend selected in configuration
pub fn open(config: &StoreConfig) -> Result<Arc<dyn CheckpointStore>> {
    Ok(match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::open(config.dir())?),
    })
}
