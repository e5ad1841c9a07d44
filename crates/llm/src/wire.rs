//! Anthropic Messages API request and response bodies.

use pipeline::{ChatMessage, CompletionRequest, Role, TokenCount, TokenUsage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

impl MessagesRequest {
    /// System messages are lifted into the top-level `system` field; the API
    /// only accepts user and assistant turns in `messages`.
    pub fn from_completion(request: &CompletionRequest, default_max_tokens: u32) -> Self {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let messages = request
            .messages
            .iter()
            .filter_map(|m: &ChatMessage| {
                let role = match m.role {
                    Role::System => return None,
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                Some(WireMessage {
                    role,
                    content: m.content.clone(),
                })
            })
            .collect();
        Self {
            model: request.model.to_string(),
            max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl MessagesResponse {
    /// Concatenated text parts, `None` if there are none.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|p| p.kind == "text")
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.usage
            .as_ref()
            .map(|u| TokenUsage {
                input: TokenCount::new(u.input_tokens),
                output: TokenCount::new(u.output_tokens),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Human-readable message from an error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            format!("{}: {}", envelope.error.kind, envelope.error.message)
        }
        _ => body.trim().chars().take(300).collect(),
    }
}
