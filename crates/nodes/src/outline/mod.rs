//! The outline pipeline: retrieve → enhance → generate → aggregate.
//!
//! Strictly sequential. [`run_outline_pipeline`] never fails: every problem,
//! including a graph that does not compile, ends up in
//! [`OutlineResult::error`] alongside an empty outline.

mod aggregate;
mod enhance;
mod generate;
mod retrieve;
pub mod state;

use pipeline::{
    CompiledGraph, GraphBuilder, OutlineRequest, OutlineResult, PitchError, RunOutcome, END,
};
use tracing::{info, instrument, warn};

pub use self::state::{EnhancedClient, EnhancedCompetitor, OutlinePatch, OutlineState};
use crate::{Collaborators, RunConfig};

pub const RETRIEVE: &str = "retrieve";
pub const ENHANCE: &str = "enhance";
pub const GENERATE: &str = "generate";
pub const AGGREGATE: &str = "aggregate";

/// A compiled outline graph bound to its collaborators.
pub struct OutlinePipeline {
    graph: CompiledGraph<OutlineState>,
}

impl OutlinePipeline {
    pub fn new(collab: &Collaborators) -> Result<Self, PitchError> {
        let graph = GraphBuilder::new("outline")
            .add_stage(RETRIEVE, retrieve::Retrieve::new(collab.store.clone()))
            .add_stage(ENHANCE, enhance::Enhance)
            .add_stage(
                GENERATE,
                generate::Generate::new(collab.settings.clone(), collab.llm.clone()),
            )
            .add_stage(AGGREGATE, aggregate::Aggregate::new(collab.store.clone()))
            .set_entry(RETRIEVE)
            .add_edge(RETRIEVE, ENHANCE)
            .add_edge(ENHANCE, GENERATE)
            .add_edge(GENERATE, AGGREGATE)
            .add_edge(AGGREGATE, END)
            .compile()?;
        Ok(Self { graph })
    }

    /// Runs the graph and returns the final state and trace.
    pub async fn invoke(&self, input: OutlineRequest) -> RunOutcome<OutlineState> {
        self.graph.invoke(OutlineState::new(input)).await
    }

    /// Runs the graph and shapes the final state into an [`OutlineResult`].
    #[instrument(skip_all, fields(thread_id = tracing::field::Empty))]
    pub async fn run(&self, input: OutlineRequest, config: RunConfig) -> OutlineResult {
        let thread_id = config.thread_id_or_random();
        tracing::Span::current().record("thread_id", tracing::field::display(thread_id));

        let outcome = self.invoke(input).await;
        let state = outcome.state;
        let result = match state.output {
            Some(output) => OutlineResult {
                initial_outline: output.initial_outline,
                summary: output.summary,
                error: output.error.or(state.error),
                thread_id,
            },
            None => OutlineResult {
                initial_outline: String::new(),
                summary: None,
                error: Some(
                    state
                        .error
                        .unwrap_or_else(|| PitchError::aggregation("outline run produced no output").to_string()),
                ),
                thread_id,
            },
        };
        match &result.error {
            Some(error) => warn!(%error, "outline pipeline failed"),
            None => info!(chars = result.initial_outline.len(), "outline pipeline finished"),
        }
        result
    }
}

/// Entry point for hosts. Never fails; see [`OutlineResult::error`].
pub async fn run_outline_pipeline(
    collab: &Collaborators,
    input: OutlineRequest,
    config: RunConfig,
) -> OutlineResult {
    match OutlinePipeline::new(collab) {
        Ok(pipeline) => pipeline.run(input, config).await,
        Err(err) => OutlineResult {
            initial_outline: String::new(),
            summary: None,
            error: Some(err.to_string()),
            thread_id: config.thread_id_or_random(),
        },
    }
}
