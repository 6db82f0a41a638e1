//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns the session state and delegates each command to a task. Only a reset
//! waits for the session lock, after cancelling the turn that holds it.

use crate::web::{
    chat_task::{apply_filter, chat_turn, listing_answer, listing_details},
    protocol::{ClientMessage, ServerMessage},
    state::{send_message, visible_listings, ActiveFilters, AppState, SessionState, WsSender},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::StreamExt;
use listing_assistant_core::{domain::FilterCriteria, CHAT_HISTORY_KEY};
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Per-connection bookkeeping for conversation turns, kept outside the session lock
/// so a reset can cancel a turn that is holding it.
struct TurnControl {
    token: CancellationToken,
    /// Mirrors the session generation; turns are queued under this value.
    generation: u64,
    handles: Vec<JoinHandle<()>>,
}

impl TurnControl {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            generation: 0,
            handles: Vec::new(),
        }
    }

    /// Cancels every queued or running turn and starts a new generation.
    fn invalidate(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.generation += 1;
        self.handles.retain(|handle| !handle.is_finished());
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let session_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init { session_id }) => session_id.unwrap_or_else(Uuid::new_v4),
            _ => {
                error!("First message was not a valid Init message.");
                let _ = send_message(
                    &ws_sender,
                    &ServerMessage::Error {
                        message: "The first message must be init.".to_string(),
                    },
                )
                .await;
                return;
            }
        },
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };
    info!("Initializing session with ID: {}", session_id);

    // The mirrored log is read once. It is reported, not rehydrated.
    match app_state.chat_logs.load_log(session_id, CHAT_HISTORY_KEY).await {
        Ok(Some(log)) => info!(
            "Found {} mirrored message(s) for session {}; starting a fresh conversation.",
            log.len(),
            session_id
        ),
        Ok(None) => {}
        Err(e) => warn!("Failed to read chat log for session {}: {}", session_id, e),
    }

    let session = SessionState::new(session_id);
    let init_msg = ServerMessage::SessionInitialized {
        session_id,
        messages: session.conversation.messages().to_vec(),
        listings: visible_listings(&app_state.catalog, &FilterCriteria::default()),
    };
    let session_state_lock = Arc::new(Mutex::new(session));
    let active_filters: ActiveFilters = Arc::new(Mutex::new(FilterCriteria::default()));
    if let Err(e) = send_message(&ws_sender, &init_msg).await {
        error!("Failed to send session initialized message: {}", e);
        return;
    }

    // --- 2. Main Message Loop ---
    let mut turns = TurnControl::new();
    let mut detail_handles: Vec<JoinHandle<()>> = Vec::new();

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(
                    text.to_string(),
                    &app_state,
                    &session_state_lock,
                    &active_filters,
                    &ws_sender,
                    &mut turns,
                    &mut detail_handles,
                )
                .await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    turns.token.cancel();
    for handle in turns.handles.into_iter().chain(detail_handles) {
        handle.abort();
    }
    info!("WebSocket connection for session {} closed.", session_id);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    active_filters: &ActiveFilters,
    ws_sender: &WsSender,
    turns: &mut TurnControl,
    detail_handles: &mut Vec<JoinHandle<()>>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(client_msg) => client_msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let _ = send_message(
                ws_sender,
                &ServerMessage::Error {
                    message: "Unrecognized message.".to_string(),
                },
            )
            .await;
            return;
        }
    };

    match client_msg {
        ClientMessage::SendMessage { text } => {
            if text.trim().is_empty() {
                return;
            }
            info!("SendMessage received.");
            let task = {
                let app_state = app_state.clone();
                let session_state_lock = session_state_lock.clone();
                let active_filters = active_filters.clone();
                let ws_sender = ws_sender.clone();
                let token = turns.token.clone();
                let generation = turns.generation;
                tokio::spawn(async move {
                    if let Err(e) = chat_turn(
                        app_state,
                        session_state_lock,
                        active_filters,
                        ws_sender,
                        text,
                        generation,
                        token,
                    )
                    .await
                    {
                        error!("Chat turn failed: {:?}", e);
                    }
                })
            };
            turns.handles.retain(|handle| !handle.is_finished());
            turns.handles.push(task);
        }
        ClientMessage::ApplyFilter { criteria } => {
            info!("ApplyFilter message received.");
            let update = apply_filter(app_state, active_filters, criteria).await;
            if let Err(e) = send_message(ws_sender, &update).await {
                error!("Failed to send ListingsUpdated message: {}", e);
            }
        }
        ClientMessage::SelectListing { listing_id } => {
            info!("SelectListing message received for {}.", listing_id);
            let app_state = app_state.clone();
            let ws_sender = ws_sender.clone();
            detail_handles.retain(|handle| !handle.is_finished());
            detail_handles.push(tokio::spawn(async move {
                if let Err(e) = listing_details(app_state, ws_sender, listing_id).await {
                    error!("Listing details failed: {:?}", e);
                }
            }));
        }
        ClientMessage::AskAboutListing { listing_id, question } => {
            info!("AskAboutListing message received for {}.", listing_id);
            let app_state = app_state.clone();
            let ws_sender = ws_sender.clone();
            detail_handles.retain(|handle| !handle.is_finished());
            detail_handles.push(tokio::spawn(async move {
                if let Err(e) = listing_answer(app_state, ws_sender, listing_id, question).await {
                    error!("Listing question failed: {:?}", e);
                }
            }));
        }
        ClientMessage::ResetConversation => {
            info!("ResetConversation message received. Cancelling pending turns.");
            turns.invalidate();

            let (session_id, messages) = {
                let mut session = session_state_lock.lock().await;
                session.conversation.reset();
                if session.conversation.generation() != turns.generation {
                    warn!(
                        "Session generation {} differs from connection generation {}.",
                        session.conversation.generation(),
                        turns.generation
                    );
                }
                (session.session_id, session.conversation.messages().to_vec())
            };
            *active_filters.lock().await = FilterCriteria::default();

            if let Err(e) = app_state.chat_logs.clear_log(session_id, CHAT_HISTORY_KEY).await {
                warn!("Failed to clear chat log for session {}: {}", session_id, e);
            }
            if let Err(e) = send_message(ws_sender, &ServerMessage::ConversationReset { messages }).await {
                error!("Failed to send ConversationReset message: {}", e);
            }
        }
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
        }
    }
}
