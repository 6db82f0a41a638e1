//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the conversational listing assistant.

use listing_assistant_core::{
    domain::{ChatMessage, FilterCriteria, Listing},
    ConversationStep,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Initializes a session. This must be the first message sent on the connection.
    /// Without an id a new session is started.
    Init {
        #[serde(default)]
        session_id: Option<Uuid>,
    },

    /// A free-text utterance for the assistant.
    SendMessage { text: String },

    /// The user changed the filter panel directly.
    ApplyFilter { criteria: FilterCriteria },

    SelectListing { listing_id: String },

    AskAboutListing { listing_id: String, question: String },

    /// Back to the first question. Any turn still in flight is discarded.
    ResetConversation,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization.
    SessionInitialized {
        session_id: Uuid,
        messages: Vec<ChatMessage>,
        listings: Vec<Listing>,
    },

    /// The assistant's reply to one utterance.
    AssistantReply {
        reply: String,
        step: ConversationStep,
    },

    /// The displayed listings changed, either from a filter or a recommendation.
    ListingsUpdated {
        criteria: FilterCriteria,
        listings: Vec<Listing>,
        recommended_ids: Vec<String>,
    },

    ListingDetails {
        listing: Listing,
        description: String,
        similar: Vec<Listing>,
    },

    ListingAnswer {
        listing_id: String,
        question: String,
        answer: String,
    },

    /// The conversation is back at its greeting.
    ConversationReset { messages: Vec<ChatMessage> },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}
