//! crates/listing_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! conversation logic independent of the hosted completion endpoint, the
//! durable chat-log storage and the listing data source.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ChatMessage, ContextTurn, Listing};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generates free text for `prompt`, given the earlier exchanges of the conversation.
    async fn generate(&self, prompt: &str, history: &[ContextTurn]) -> PortResult<String>;
}

/// Key-value persistence of a conversation log.
#[async_trait]
pub trait ChatLogStore: Send + Sync {
    async fn save_log(&self, session_id: Uuid, key: &str, messages: &[ChatMessage]) -> PortResult<()>;

    async fn load_log(&self, session_id: Uuid, key: &str) -> PortResult<Option<Vec<ChatMessage>>>;

    async fn clear_log(&self, session_id: Uuid, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Loads the whole catalog. There is no query language and no pagination.
    async fn load_listings(&self) -> PortResult<Vec<Listing>>;
}
