//! services/api/src/adapters/memory_store.rs
//!
//! Process-local `ChatLogStore`, used when no `DATABASE_URL` is configured.
//! Logs live as long as the process.

use async_trait::async_trait;
use listing_assistant_core::domain::ChatMessage;
use listing_assistant_core::ports::{ChatLogStore, PortResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryChatLogStore {
    logs: RwLock<HashMap<(Uuid, String), Vec<ChatMessage>>>,
}

impl InMemoryChatLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatLogStore for InMemoryChatLogStore {
    async fn save_log(&self, session_id: Uuid, key: &str, messages: &[ChatMessage]) -> PortResult<()> {
        self.logs
            .write()
            .await
            .insert((session_id, key.to_string()), messages.to_vec());
        Ok(())
    }

    async fn load_log(&self, session_id: Uuid, key: &str) -> PortResult<Option<Vec<ChatMessage>>> {
        Ok(self
            .logs
            .read()
            .await
            .get(&(session_id, key.to_string()))
            .cloned())
    }

    async fn clear_log(&self, session_id: Uuid, key: &str) -> PortResult<()> {
        self.logs.write().await.remove(&(session_id, key.to_string()));
        Ok(())
    }
}
