//! Port traits for the three external collaborators.
//!
//! The pipelines only ever see these traits. Concrete adapters live in
//! infrastructure crates (`llm`, `store`); tests substitute doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ModelName, PitchError, Record, TokenUsage};

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// Collection holding client records.
pub const CLIENTS: &str = "clients";
/// Collection holding competitor records.
pub const COMPETITORS: &str = "competitors";
/// Collection holding pitch records; results are written back here.
pub const PITCHES: &str = "pitches";

/// A key-value document store.
///
/// `update` overwrites the given fields unconditionally (last writer wins);
/// no transaction or version check is implied.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches one record, `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, PitchError>;

    /// Returns every record whose `field` equals `value`.
    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, PitchError>;

    /// Merges `fields` into the record, creating it if needed.
    async fn update(&self, collection: &str, id: &str, fields: Record) -> Result<(), PitchError>;
}

// ---------------------------------------------------------------------------
// LLM completion service
// ---------------------------------------------------------------------------

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request. `model` is always concrete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: ModelName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A provider's answer to a [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// An LLM completion service. Treated as a black box by the pipelines.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends `request` and returns the model's text response.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, PitchError>;
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Slide structure and writing principles for one pitch stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageTemplate {
    pub slide_structure_list: Vec<String>,
    pub key_principles_list: Vec<String>,
}

impl StageTemplate {
    /// Returns `true` if the template has no slides configured.
    pub fn is_empty(&self) -> bool {
        self.slide_structure_list.is_empty()
    }
}

/// Source of configured stage templates.
///
/// Implementations answer for canonical stage names only; legacy key
/// translation and the built-in fallback are applied by the caller.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Returns the configured template for `stage`, `None` if nothing is set.
    async fn stage_template(&self, stage: &str) -> Result<Option<StageTemplate>, PitchError>;
}
