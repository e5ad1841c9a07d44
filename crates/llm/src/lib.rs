//! LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for Anthropic's Messages
//! API. Additional providers are added as new modules in this crate without
//! any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, retry classification and exponential back-off live here. The
//! [`pipeline`] crate sees only [`pipeline::LlmProvider`].

mod anthropic;
mod errors;
mod wire;

pub use anthropic::{AnthropicConfig, AnthropicProvider, DEFAULT_BASE_URL};
pub use errors::LlmError;
