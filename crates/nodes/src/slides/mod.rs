//! The slide pipeline.
//!
//! ```text
//! initialize → parallel_generate ─┬─ error ──→ error_handler → END
//!                                 └─ ok ─────→ reviewer ─┬─ revise ─→ content_updater ─┐
//!                                                        └─ pass ───────────────────────┴→ title_enhancer → aggregate → END
//! ```
//!
//! [`run_slide_pipeline`] returns `Err` only when the run produced no usable
//! slides. A partial failure comes back as `Ok` with a nonzero
//! `failed_slides` count and a summary naming the shortfall.

mod aggregate;
mod draft;
mod error_handler;
mod generate;
mod initialize;
mod review;
pub mod state;
mod titles;
mod update;

#[cfg(test)]
mod fixtures;

use pipeline::{
    CompiledGraph, GraphBuilder, PitchError, Route, RunOutcome, SlideRequest, SlideResult, END,
};
use tracing::{info, instrument, warn};

pub use self::state::{SlidePatch, SlideState};
use crate::{Collaborators, RunConfig};

pub const INITIALIZE: &str = "initialize";
pub const PARALLEL_GENERATE: &str = "parallel_generate";
pub const ERROR_HANDLER: &str = "error_handler";
pub const REVIEWER: &str = "reviewer";
pub const CONTENT_UPDATER: &str = "content_updater";
pub const TITLE_ENHANCER: &str = "title_enhancer";
pub const AGGREGATE: &str = "aggregate";

/// Branch taken after the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterGeneration {
    HandleError,
    Review,
}

impl Route for AfterGeneration {
    fn variants() -> &'static [Self] {
        &[Self::HandleError, Self::Review]
    }

    fn target(self) -> &'static str {
        match self {
            Self::HandleError => ERROR_HANDLER,
            Self::Review => REVIEWER,
        }
    }
}

/// Branch taken after review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterReview {
    Revise,
    EnhanceTitles,
}

impl Route for AfterReview {
    fn variants() -> &'static [Self] {
        &[Self::Revise, Self::EnhanceTitles]
    }

    fn target(self) -> &'static str {
        match self {
            Self::Revise => CONTENT_UPDATER,
            Self::EnhanceTitles => TITLE_ENHANCER,
        }
    }
}

fn after_generation(state: &SlideState) -> AfterGeneration {
    if state.error.is_some() {
        AfterGeneration::HandleError
    } else {
        AfterGeneration::Review
    }
}

fn after_review(state: &SlideState) -> AfterReview {
    if state.needs_revision {
        AfterReview::Revise
    } else {
        AfterReview::EnhanceTitles
    }
}

/// A compiled slide graph bound to its collaborators.
pub struct SlidePipeline {
    graph: CompiledGraph<SlideState>,
}

impl SlidePipeline {
    pub fn new(collab: &Collaborators) -> Result<Self, PitchError> {
        let graph = GraphBuilder::new("slides")
            .add_stage(INITIALIZE, initialize::Initialize)
            .add_stage(PARALLEL_GENERATE, generate::ParallelGenerate::new(collab.llm.clone()))
            .add_stage(ERROR_HANDLER, error_handler::ErrorHandler::new(collab.store.clone()))
            .add_stage(REVIEWER, review::Reviewer::new(collab.llm.clone()))
            .add_stage(CONTENT_UPDATER, update::ContentUpdater::new(collab.llm.clone()))
            .add_stage(TITLE_ENHANCER, titles::TitleEnhancer::new(collab.llm.clone()))
            .add_stage(AGGREGATE, aggregate::Aggregate::new(collab.store.clone()))
            .set_entry(INITIALIZE)
            .add_edge(INITIALIZE, PARALLEL_GENERATE)
            .add_conditional_edge(PARALLEL_GENERATE, after_generation)
            .add_edge(ERROR_HANDLER, END)
            .add_conditional_edge(REVIEWER, after_review)
            .add_edge(CONTENT_UPDATER, TITLE_ENHANCER)
            .add_edge(TITLE_ENHANCER, AGGREGATE)
            .add_edge(AGGREGATE, END)
            .compile()?;
        Ok(Self { graph })
    }

    /// Runs the graph and returns the final state and trace.
    pub async fn invoke(&self, input: SlideRequest) -> RunOutcome<SlideState> {
        self.graph.invoke(SlideState::new(input)).await
    }

    /// Runs the graph and extracts the result.
    #[instrument(skip_all, fields(thread_id = tracing::field::Empty, slides = input.slide_outlines.len()))]
    pub async fn run(&self, input: SlideRequest, config: RunConfig) -> Result<SlideResult, PitchError> {
        let thread_id = config.thread_id_or_random();
        tracing::Span::current().record("thread_id", tracing::field::display(thread_id));

        let state = self.invoke(input).await.state;
        match state.output {
            Some(result) if !result.slides.is_empty() => {
                info!(
                    slides = result.slides.len(),
                    failed = result.generation_metadata.failed_slides,
                    "slide pipeline finished"
                );
                Ok(result)
            }
            Some(result) => {
                let message = state.error.unwrap_or(result.summary);
                warn!(error = %message, "slide pipeline produced no slides");
                Err(PitchError::aggregation(message))
            }
            None => {
                let message = state
                    .error
                    .unwrap_or_else(|| "slide run produced no output".to_string());
                warn!(error = %message, "slide pipeline produced no output");
                Err(PitchError::aggregation(message))
            }
        }
    }
}

/// Entry point for hosts. Fails only when no slides could be produced.
pub async fn run_slide_pipeline(
    collab: &Collaborators,
    input: SlideRequest,
    config: RunConfig,
) -> Result<SlideResult, PitchError> {
    SlidePipeline::new(collab)?.run(input, config).await
}
