//! crates/listing_assistant_core/src/completion.rs
//!
//! Client for the hosted completion endpoint. Adds a per-conversation rolling
//! context, retries with capped exponential backoff, and converts terminal
//! failures into fixed user-facing replies so callers always receive text.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::domain::ContextTurn;
use crate::ports::{CompletionService, PortError};

/// Number of prompt/reply exchanges kept in a rolling context.
pub const MAX_CONTEXT_TURNS: usize = 10;

//=========================================================================================
// Conversation Context
//=========================================================================================

/// Rolling history of exchanges with the completion endpoint, owned by one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionContext {
    turns: Vec<ContextTurn>,
}

impl CompletionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ContextTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Appends an exchange, evicting the oldest ones beyond [`MAX_CONTEXT_TURNS`].
    pub fn push(&mut self, prompt: impl Into<String>, reply: impl Into<String>) {
        self.turns.push(ContextTurn {
            prompt: prompt.into(),
            reply: reply.into(),
        });
        if self.turns.len() > MAX_CONTEXT_TURNS {
            let overflow = self.turns.len() - MAX_CONTEXT_TURNS;
            self.turns.drain(..overflow);
        }
    }
}

//=========================================================================================
// Retry Policy and Fallback Replies
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts per call. Zero is treated as one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Total time spent sleeping when all `attempts` fail.
    pub fn total_backoff(&self, attempts: u32) -> Duration {
        (0..attempts.saturating_sub(1)).map(|attempt| self.delay_for(attempt)).sum()
    }
}

/// The fixed replies returned instead of an error once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReply {
    Capacity,
    Connectivity,
    MalformedRequest,
    Generic,
}

impl FallbackReply {
    /// Classifies a terminal error by the substrings of its message.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("quota") || lowered.contains("rate limit") {
            FallbackReply::Capacity
        } else if lowered.contains("network") || lowered.contains("timeout") {
            FallbackReply::Connectivity
        } else if lowered.contains("invalid") {
            FallbackReply::MalformedRequest
        } else {
            FallbackReply::Generic
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FallbackReply::Capacity => {
                "I'm getting a lot of requests right now. Please wait a moment and try again."
            }
            FallbackReply::Connectivity => {
                "I'm having trouble connecting right now. Please check your connection and try again."
            }
            FallbackReply::MalformedRequest => {
                "I couldn't process that request. Could you try rephrasing it?"
            }
            FallbackReply::Generic => {
                "I'm having trouble processing that request. Please try again later."
            }
        }
    }
}

/// Returned by [`CompletionClient::try_complete`] once every attempt has failed.
#[derive(Debug, thiserror::Error)]
#[error("Completion failed after {attempts} attempt(s): {last_error}")]
pub struct CompletionFailure {
    pub attempts: u32,
    pub last_error: PortError,
}

impl CompletionFailure {
    pub fn fallback(&self) -> FallbackReply {
        FallbackReply::classify(&self.last_error.to_string())
    }
}

//=========================================================================================
// Client
//=========================================================================================

#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(service: Arc<dyn CompletionService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Completes `prompt` with the configured number of attempts. Never fails:
    /// a terminal error becomes one of the [`FallbackReply`] messages.
    pub async fn complete(
        &self,
        context: &mut CompletionContext,
        prompt: &str,
        fresh_context: bool,
    ) -> String {
        self.complete_with_retries(context, prompt, fresh_context, self.policy.max_retries)
            .await
    }

    pub async fn complete_with_retries(
        &self,
        context: &mut CompletionContext,
        prompt: &str,
        fresh_context: bool,
        max_retries: u32,
    ) -> String {
        match self
            .try_complete(context, prompt, fresh_context, max_retries)
            .await
        {
            Ok(text) => text,
            Err(failure) => failure.fallback().message().to_string(),
        }
    }

    /// Like [`complete_with_retries`](Self::complete_with_retries) but hands the terminal
    /// failure back, for callers with their own fallback.
    pub async fn try_complete(
        &self,
        context: &mut CompletionContext,
        prompt: &str,
        fresh_context: bool,
        max_retries: u32,
    ) -> Result<String, CompletionFailure> {
        if fresh_context {
            context.clear();
        }

        let attempts = max_retries.max(1);
        let mut attempt = 0;
        loop {
            match self.service.generate(prompt, context.turns()).await {
                Ok(text) => {
                    context.push(prompt, text.clone());
                    return Ok(text);
                }
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Completion attempt {} of {} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Completion failed after {} attempt(s): {}", attempts, e);
                    return Err(CompletionFailure {
                        attempts,
                        last_error: e,
                    });
                }
            }
        }
    }
}
