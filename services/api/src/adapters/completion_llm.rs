//! services/api/src/adapters/completion_llm.rs
//!
//! This module contains the adapter for the hosted completion endpoint.
//! It implements the `CompletionService` port from the `core` crate by talking to
//! Gemini through its OpenAI-compatible chat completions API.

const SYSTEM_INSTRUCTIONS: &str = "You are a friendly real estate assistant helping someone find a home. Keep answers short and conversational. When asked to return property ids, return only what was asked for, without commentary.";

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use listing_assistant_core::{
    domain::ContextTurn,
    ports::{CompletionService, PortError, PortResult},
};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionService` using an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct GeminiCompletionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiCompletionAdapter {
    /// Creates a new `GeminiCompletionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds the client for `api_base` authenticated with `api_key`.
    pub fn from_key(api_key: &str, api_base: &str, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self::new(Client::with_config(config), model)
    }
}

/// System instructions, then the earlier exchanges in order, then the new prompt.
fn build_messages(prompt: &str, history: &[ContextTurn]) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_INSTRUCTIONS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );

    for turn in history {
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(turn.prompt.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.reply.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
    }

    messages.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );
    Ok(messages)
}

//=========================================================================================
// `CompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionService for GeminiCompletionAdapter {
    async fn generate(&self, prompt: &str, history: &[ContextTurn]) -> PortResult<String> {
        let messages = build_messages(prompt, history)?;
        debug!("Sending completion request with {} message(s)", messages.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // The error text is kept intact; the core classifies it by substring.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            PortError::Unexpected("Completion endpoint returned no choices in its response.".to_string())
        })?;
        choice
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("Completion endpoint response contained no text content.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_replayed_between_system_and_prompt() {
        let history = vec![
            ContextTurn {
                prompt: "hi".to_string(),
                reply: "hello!".to_string(),
            },
            ContextTurn {
                prompt: "any pools?".to_string(),
                reply: "two of them".to_string(),
            },
        ];

        let messages = build_messages("and gardens?", &history).unwrap();

        assert_eq!(messages.len(), 6);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[4], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[5], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn empty_history_sends_system_and_prompt() {
        let messages = build_messages("hello", &[]).unwrap();
        assert_eq!(messages.len(), 2);
    }
}
