//! Pipeline stages, the LLM gateway and the two pipeline entry points.
//!
//! This crate wires the stage graphs defined with [`pipeline::GraphBuilder`]
//! to the three external collaborators and exposes the only two calls a host
//! application makes: [`run_outline_pipeline`] and [`run_slide_pipeline`].
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between the domain types in
//! the [`pipeline`] crate and the port traits (document store, LLM provider,
//! settings). Prompt text lives here; parsing and merge rules do not.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gateway`] | `LlmGateway`: model, temperatures, per-call timeout |
//! | [`templates`] | Stage-template resolution and the built-in fallback |
//! | [`format`] | Idempotent outline text normalisation |
//! | [`outline`] | The four-stage outline pipeline |
//! | [`slides`] | The branching slide pipeline |

use std::sync::Arc;

use pipeline::{DocumentStore, SettingsProvider, ThreadId};

pub mod format;
pub mod gateway;
pub mod outline;
pub mod slides;
pub mod templates;

pub use gateway::{CallPurpose, GenerationOptions, LlmGateway, DEFAULT_CALL_TIMEOUT};
pub use outline::{run_outline_pipeline, OutlinePipeline};
pub use slides::{run_slide_pipeline, SlidePipeline};

/// The external services every stage may call.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub settings: Arc<dyn SettingsProvider>,
    pub llm: LlmGateway,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settings: Arc<dyn SettingsProvider>,
        llm: LlmGateway,
    ) -> Self {
        Self {
            store,
            settings,
            llm,
        }
    }
}

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    /// Correlates logs for one run. A random id is used when absent.
    pub thread_id: Option<ThreadId>,
}

impl RunConfig {
    pub fn with_thread_id(thread_id: ThreadId) -> Self {
        Self {
            thread_id: Some(thread_id),
        }
    }

    pub fn thread_id_or_random(&self) -> ThreadId {
        self.thread_id.unwrap_or_else(ThreadId::new_random)
    }
}
