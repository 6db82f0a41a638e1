//! crates/listing_assistant_core/src/session.rs
//!
//! The state of one guided conversation: collected preferences, the current step,
//! the message log and the rolling completion context.

use serde::{Deserialize, Serialize};

use crate::completion::CompletionContext;
use crate::domain::{ChatMessage, Preferences};

pub const GREETING: &str =
    "Hi! I'm your Property Assistant. What type of home are you looking for?";

/// Storage key the message log is mirrored under.
pub const CHAT_HISTORY_KEY: &str = "chatHistory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    PropertyType,
    Budget,
    Locations,
    Amenities,
    /// Open-ended chat once every preference has been collected. Loops forever.
    Open,
}

impl ConversationStep {
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Self::PropertyType,
            1 => Self::Budget,
            2 => Self::Locations,
            3 => Self::Amenities,
            _ => Self::Open,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Self::PropertyType => 0,
            Self::Budget => 1,
            Self::Locations => 2,
            Self::Amenities => 3,
            Self::Open => 4,
        }
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1)
    }
}

/// Exclusive to one conversation. Callers serialize access to it.
#[derive(Debug)]
pub struct PreferenceSession {
    preferences: Preferences,
    step: ConversationStep,
    messages: Vec<ChatMessage>,
    context: CompletionContext,
    generation: u64,
}

impl PreferenceSession {
    pub fn new() -> Self {
        Self {
            preferences: Preferences::default(),
            step: ConversationStep::PropertyType,
            messages: vec![ChatMessage::assistant(GREETING)],
            context: CompletionContext::new(),
            generation: 0,
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn step(&self) -> ConversationStep {
        self.step
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn context(&self) -> &CompletionContext {
        &self.context
    }

    /// Bumped by every reset. A turn queued under an older generation is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.preferences
    }

    pub(crate) fn context_mut(&mut self) -> &mut CompletionContext {
        &mut self.context
    }

    pub(crate) fn advance(&mut self) {
        self.step = self.step.next();
    }

    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Back to step 0 with only the greeting in the log.
    pub fn reset(&mut self) {
        self.preferences = Preferences::default();
        self.step = ConversationStep::PropertyType;
        self.messages = vec![ChatMessage::assistant(GREETING)];
        self.context.clear();
        self.generation += 1;
    }

    /// The log is mirrored to durable storage only once it holds more than the greeting.
    pub fn should_mirror(&self) -> bool {
        self.messages.len() > 1
    }
}

impl Default for PreferenceSession {
    fn default() -> Self {
        Self::new()
    }
}
