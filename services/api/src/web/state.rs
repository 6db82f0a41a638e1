//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::web::protocol::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use futures::{stream::SplitSink, SinkExt};
use listing_assistant_core::{
    domain::{FilterCriteria, ListingCatalog},
    filter::filter_listings,
    ports::{ChatLogStore, PortError, PortResult},
    ConversationController, Listing, PreferenceSession,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// The write half of a WebSocket, shared between the connection loop and its tasks.
pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ListingCatalog>,
    pub chat_logs: Arc<dyn ChatLogStore>,
    pub controller: Arc<ConversationController>,
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The conversation of a single, active WebSocket connection.
///
/// A running turn holds this lock across its completion calls.
pub struct SessionState {
    pub session_id: Uuid,
    pub conversation: PreferenceSession,
}

impl SessionState {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            conversation: PreferenceSession::new(),
        }
    }
}

/// The filter currently applied to the displayed listings.
///
/// Kept apart from [`SessionState`] and only locked for short updates, so the
/// connection loop never waits on a turn.
pub type ActiveFilters = Arc<Mutex<FilterCriteria>>;

/// The catalog narrowed down by `criteria`.
pub fn visible_listings(catalog: &ListingCatalog, criteria: &FilterCriteria) -> Vec<Listing> {
    filter_listings(catalog.listings(), criteria)
}

//=========================================================================================
// Outbound Helpers
//=========================================================================================

/// Serializes `message` and writes it as a text frame.
pub async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> PortResult<()> {
    let json = serde_json::to_string(message).map_err(|e| PortError::Unexpected(e.to_string()))?;
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to send message: {}", e)))
}
