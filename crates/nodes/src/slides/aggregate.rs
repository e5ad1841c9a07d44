//! Terminal slide stage, plus the result assembly shared with the error
//! handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    DocumentStore, GeneratedSlideContent, GenerationMetadata, PitchError, ProcessingMetadata,
    Record, SlideResult, Stage, Timestamp, PITCHES,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::state::{SlidePatch, SlideState};

/// Slides ordered by their outline's `number`.
pub(crate) fn sorted_slides(state: &SlideState) -> Vec<GeneratedSlideContent> {
    let mut slides = state.generated_slides.clone();
    slides.sort_by_key(|s| s.metadata.outline_number);
    slides
}

/// Counts, duration and source names for a finished run.
pub(crate) fn generation_metadata(
    state: &SlideState,
    slides: &[GeneratedSlideContent],
    end: Timestamp,
) -> GenerationMetadata {
    let meta = &state.processing_metadata;
    let total = meta.total_slides.unwrap_or(state.input.slide_outlines.len());
    let successful = slides.len();
    let failed = meta
        .failed_slides
        .unwrap_or_else(|| total.saturating_sub(successful));
    let processing_time = meta
        .start_time
        .map(|start| end.duration_since(start).as_millis() as u64)
        .unwrap_or(0);
    let context_sources: BTreeSet<&String> = slides
        .iter()
        .flat_map(|s| s.metadata.context_sources.iter())
        .collect();

    GenerationMetadata {
        total_slides: total,
        successful_slides: successful,
        failed_slides: failed,
        processing_time,
        context_sources: context_sources.into_iter().cloned().collect(),
    }
}

/// Best-effort write of the result to the pitch record.
pub(crate) async fn persist(store: &dyn DocumentStore, state: &SlideState, result: &SlideResult) {
    let Some(pitch_id) = state.input.pitch_id.as_ref().filter(|id| !id.is_blank()) else {
        return;
    };
    let (slides, metadata) = match (
        serde_json::to_value(&result.slides),
        serde_json::to_value(&result.generation_metadata),
    ) {
        (Ok(slides), Ok(metadata)) => (slides, metadata),
        (Err(err), _) | (_, Err(err)) => {
            warn!(pitch = %pitch_id, error = %err, "could not encode slides for saving");
            return;
        }
    };
    let mut fields = Record::new();
    fields.insert("slides".into(), slides);
    fields.insert("generationMetadata".into(), metadata);
    fields.insert("slidesSummary".into(), Value::String(result.summary.clone()));
    fields.insert(
        "slidesGeneratedAt".into(),
        Value::String(Timestamp::now().to_string()),
    );
    if let Err(err) = store.update(PITCHES, pitch_id.as_str(), fields).await {
        warn!(pitch = %pitch_id, error = %err, "failed to save slides, result is unaffected");
    }
}

pub struct Aggregate {
    store: Arc<dyn DocumentStore>,
}

impl Aggregate {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage<SlideState> for Aggregate {
    #[instrument(name = "aggregate", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        if state.error.is_some() {
            return Ok(SlidePatch::default());
        }
        if state.generated_slides.is_empty() {
            return Err(PitchError::aggregation("no slides were generated"));
        }

        let end = Timestamp::now();
        let slides = sorted_slides(&state);
        let generation_metadata = generation_metadata(&state, &slides, end);

        let mut summary = format!("Successfully generated {} slides", slides.len());
        if generation_metadata.failed_slides > 0 {
            summary.push_str(&format!("; {} slides failed", generation_metadata.failed_slides));
        }

        let result = SlideResult {
            slides,
            summary,
            generation_metadata,
        };
        persist(self.store.as_ref(), &state, &result).await;
        info!(
            slides = result.slides.len(),
            elapsed_ms = result.generation_metadata.processing_time,
            "slides assembled"
        );
        Ok(SlidePatch {
            processing_metadata: Some(ProcessingMetadata {
                end_time: Some(end),
                ..Default::default()
            }),
            output: Some(result),
            ..Default::default()
        })
    }
}
