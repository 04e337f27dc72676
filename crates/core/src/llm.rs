//! Azure OpenAI chat-completions wire format.
//!
//! This module contains zero I/O operations: request bodies, URLs, and
//! response transformation only.

use serde::{Deserialize, Serialize};

use crate::conversation::{ChatMessage, Role};

// ============================================================================
// Domain Models (Request)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// ============================================================================
// Domain Models (Response)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ============================================================================
// Pure Transformation Functions
// ============================================================================

/// Chat-completions endpoint for an Azure deployment.
pub fn completion_url(base_url: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        base_url.trim_end_matches('/'),
        deployment,
        api_version
    )
}

/// Convert a conversation into chat-completions messages.
///
/// The system message comes first. Assistant turns keep the `assistant` role;
/// user and executor turns are sent as `user` messages named after the
/// participant.
pub fn to_wire_messages(system: &str, messages: &[ChatMessage]) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + 1);

    wire.push(WireMessage {
        role: "system".to_string(),
        content: system.to_string(),
        name: None,
    });

    wire.extend(messages.iter().map(|m| match m.role {
        Role::Assistant => WireMessage {
            role: "assistant".to_string(),
            content: m.content.clone(),
            name: None,
        },
        Role::User | Role::Executor => WireMessage {
            role: "user".to_string(),
            content: m.content.clone(),
            name: Some(m.role.to_string()),
        },
    }));

    wire
}

/// Text of the first choice, if the model returned any.
pub fn first_choice_content(response: &ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
}
