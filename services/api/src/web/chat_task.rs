//! services/api/src/web/chat_task.rs
//!
//! This module contains the asynchronous "worker" functions spawned by the
//! connection loop: one conversation turn, and the listing-detail requests.

use crate::web::{
    protocol::ServerMessage,
    state::{send_message, visible_listings, AppState, SessionState, WsSender},
};
use listing_assistant_core::{domain::FilterCriteria, ports::PortResult, CHAT_HISTORY_KEY};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs one conversation turn for `text` and sends what it produced.
pub async fn chat_turn(
    app_state: Arc<AppState>,
    session_state_lock: Arc<Mutex<SessionState>>,
    active_filters: Arc<Mutex<FilterCriteria>>,
    ws_sender: WsSender,
    text: String,
    generation: u64,
    token: CancellationToken,
) -> PortResult<()> {
    let messages = run_turn(
        &app_state,
        &session_state_lock,
        &active_filters,
        &text,
        generation,
        &token,
    )
    .await;
    for message in messages {
        if token.is_cancelled() {
            info!("Turn cancelled before its reply was sent.");
            break;
        }
        send_message(&ws_sender, &message).await?;
    }
    Ok(())
}

/// The body of a turn, without the socket.
///
/// Returns nothing when `token` is cancelled, or when the session was reset after
/// the turn was queued (`generation` is stale). Otherwise the reply, followed by
/// the updated listings when the turn changed them.
pub(crate) async fn run_turn(
    app_state: &AppState,
    session_state_lock: &Mutex<SessionState>,
    active_filters: &Mutex<FilterCriteria>,
    text: &str,
    generation: u64,
    token: &CancellationToken,
) -> Vec<ServerMessage> {
    let start_time = Instant::now();

    let mut session = tokio::select! {
        biased;
        _ = token.cancelled() => {
            info!("Turn cancelled before it started.");
            return Vec::new();
        }
        guard = session_state_lock.lock() => guard,
    };

    if session.conversation.generation() != generation {
        info!(
            "Skipping stale turn (queued under generation {}, session is at {}).",
            generation,
            session.conversation.generation()
        );
        return Vec::new();
    }

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => {
            info!("Turn cancelled while waiting for the assistant.");
            return Vec::new();
        }
        outcome = app_state.controller.handle_message(&mut session.conversation, text) => outcome,
    };
    info!(
        "Turn finished at step {:?} in {:?}",
        outcome.step,
        start_time.elapsed()
    );

    let mut messages = vec![ServerMessage::AssistantReply {
        reply: outcome.reply,
        step: outcome.step,
    }];
    if outcome.filters.is_some() || !outcome.recommended_ids.is_empty() {
        let mut active = active_filters.lock().await;
        if let Some(filters) = outcome.filters {
            *active = filters;
        }
        messages.push(ServerMessage::ListingsUpdated {
            criteria: active.clone(),
            listings: visible_listings(&app_state.catalog, &active),
            recommended_ids: outcome.recommended_ids,
        });
    }

    let session_id = session.session_id;
    let mirror = session
        .conversation
        .should_mirror()
        .then(|| session.conversation.messages().to_vec());
    drop(session);

    // Storage is best-effort: a failed write never aborts the turn.
    if let Some(log) = mirror {
        if let Err(e) = app_state
            .chat_logs
            .save_log(session_id, CHAT_HISTORY_KEY, &log)
            .await
        {
            warn!("Failed to mirror chat log for session {}: {}", session_id, e);
        }
    }
    messages
}

/// Replaces the active filter. Never touches the session lock.
pub(crate) async fn apply_filter(
    app_state: &AppState,
    active_filters: &Mutex<FilterCriteria>,
    criteria: FilterCriteria,
) -> ServerMessage {
    let mut active = active_filters.lock().await;
    *active = criteria;
    ServerMessage::ListingsUpdated {
        criteria: active.clone(),
        listings: visible_listings(&app_state.catalog, &active),
        recommended_ids: Vec::new(),
    }
}

/// Describes the selected listing and looks up similar ones.
pub async fn listing_details(
    app_state: Arc<AppState>,
    ws_sender: WsSender,
    listing_id: String,
) -> PortResult<()> {
    let Some(listing) = app_state.catalog.find(&listing_id).cloned() else {
        return send_message(
            &ws_sender,
            &ServerMessage::Error {
                message: format!("Listing {} not found.", listing_id),
            },
        )
        .await;
    };

    let recommender = app_state.controller.recommender();
    let description = recommender.describe_listing(&listing).await;
    let similar_ids = recommender
        .similar_listings(&listing, app_state.catalog.listings())
        .await;
    let similar = app_state.catalog.resolve(&similar_ids);
    info!("Prepared details for {} with {} similar listing(s)", listing.id, similar.len());

    send_message(
        &ws_sender,
        &ServerMessage::ListingDetails {
            listing,
            description,
            similar,
        },
    )
    .await
}

/// Answers a question about one listing.
pub async fn listing_answer(
    app_state: Arc<AppState>,
    ws_sender: WsSender,
    listing_id: String,
    question: String,
) -> PortResult<()> {
    let Some(listing) = app_state.catalog.find(&listing_id) else {
        return send_message(
            &ws_sender,
            &ServerMessage::Error {
                message: format!("Listing {} not found.", listing_id),
            },
        )
        .await;
    };

    let answer = app_state
        .controller
        .recommender()
        .answer_listing_question(&question, listing)
        .await;

    send_message(
        &ws_sender,
        &ServerMessage::ListingAnswer {
            listing_id,
            question,
            answer,
        },
    )
    .await
}
