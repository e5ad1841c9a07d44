//! Core orchestration domain for pitch generation.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, error type, and port trait used by the two generation pipelines, plus
//! the stage-graph executor that runs them. Infrastructure crates implement
//! the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ClientId`, `PitchId`, `ThreadId`, etc.) |
//! | [`types`] | Value types (`TokenCount`, `ReviewScore`, `Timestamp`, etc.) |
//! | [`deck`] | Requests, results, slide outlines and generated content |
//! | [`errors`] | The failure taxonomy and retry policy |
//! | [`ports`] | Document store, LLM provider and settings traits |
//! | [`state`] | Pipeline state trait and per-field merge policies |
//! | [`graph`] | Stage graph builder, compiler and executor |
//! | [`fanout`] | Launch-all, await-all task settlement |
//! | [`json`] | JSON extraction from model output |

pub mod deck;
pub mod errors;
pub mod fanout;
pub mod graph;
pub mod identifiers;
pub mod json;
pub mod ports;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use deck::{
    ContentBlock, ContextData, ContextSource, GeneratedSlideContent, GenerationMetadata,
    OutlineOutput, OutlineRequest, OutlineResult, PitchContext, ProcessingMetadata, Record,
    ReviewIssue, ReviewResult, SlideBody, SlideMetadata, SlideOutline, SlideRequest, SlideResult,
    SlideStatus, SlideType, UploadedFile,
};
pub use errors::{PitchError, RetryPolicy};
pub use fanout::settle_all;
pub use graph::{CompiledGraph, GraphBuilder, Route, RunOutcome, Stage, END};
pub use identifiers::{
    ClientId, CompetitorId, ModelName, PitchId, ThreadId, MANUAL_COMPETITOR_PREFIX,
};
pub use json::parse_model_json;
pub use ports::{
    ChatMessage, Completion, CompletionRequest, DocumentStore, LlmProvider, Role,
    SettingsProvider, StageTemplate, CLIENTS, COMPETITORS, PITCHES,
};
pub use state::{ListPatch, PipelineState};
pub use types::{ReviewScore, Severity, Timestamp, TokenCount, TokenUsage};
