//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ChatLogStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use listing_assistant_core::domain::ChatMessage;
use listing_assistant_core::ports::{ChatLogStore, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ChatLogStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChatLogRecord {
    messages: Json<Vec<ChatMessage>>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}
impl ChatLogRecord {
    fn to_domain(self) -> Vec<ChatMessage> {
        self.messages.0
    }
}

//=========================================================================================
// `ChatLogStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatLogStore for DbAdapter {
    async fn save_log(&self, session_id: Uuid, key: &str, messages: &[ChatMessage]) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_logs (session_id, log_key, messages, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (session_id, log_key) DO UPDATE SET messages = EXCLUDED.messages, updated_at = NOW()",
        )
        .bind(session_id)
        .bind(key)
        .bind(Json(messages))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn load_log(&self, session_id: Uuid, key: &str) -> PortResult<Option<Vec<ChatMessage>>> {
        let record = sqlx::query_as::<_, ChatLogRecord>(
            "SELECT messages, updated_at FROM chat_logs WHERE session_id = $1 AND log_key = $2",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(ChatLogRecord::to_domain))
    }

    async fn clear_log(&self, session_id: Uuid, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM chat_logs WHERE session_id = $1 AND log_key = $2")
            .bind(session_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
