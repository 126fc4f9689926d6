//! In-memory checkpoint store, lives for the process lifetime

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::{Message, Result, ThreadId};
use crate::store::CheckpointStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    threads: RwLock<HashMap<ThreadId, Vec<Message>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        Ok(self
            .threads
            .read()
            .await
            .get(thread)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, thread: &ThreadId, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        self.threads
            .write()
            .await
            .entry(thread.clone())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    async fn threads(&self) -> Result<Vec<ThreadId>> {
        let mut ids: Vec<ThreadId> = self.threads.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_thread_is_empty() {
        let store = MemoryStore::new();
        let history = store.load(&ThreadId::from("nope")).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order_per_thread() {
        let store = MemoryStore::new();
        let a = ThreadId::from("a");
        let b = ThreadId::from("b");

        store.append(&a, &[Message::human("1")]).await.unwrap();
        store.append(&b, &[Message::human("other")]).await.unwrap();
        store
            .append(&a, &[Message::assistant("2"), Message::human("3")])
            .await
            .unwrap();

        let history = store.load(&a).await.unwrap();
        let contents: Vec<_> = history.iter().filter_map(|m| m.content()).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
        assert_eq!(store.threads().await.unwrap(), vec![a, b]);
    }
}
