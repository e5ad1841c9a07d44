//! Turns a generation failure into a reportable result.
//!
//! Slides that did generate are kept, so a partial failure still hands the
//! caller every usable slide. Only a total failure reports an empty deck.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{DocumentStore, PitchError, ProcessingMetadata, SlideResult, Stage, Timestamp};
use tracing::{instrument, warn};

use super::aggregate::{generation_metadata, persist, sorted_slides};
use super::state::{SlidePatch, SlideState};

pub struct ErrorHandler {
    store: Arc<dyn DocumentStore>,
}

impl ErrorHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage<SlideState> for ErrorHandler {
    #[instrument(name = "error_handler", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        let end = Timestamp::now();
        let slides = sorted_slides(&state);
        let generation_metadata = generation_metadata(&state, &slides, end);
        let reason = state.error.as_deref().unwrap_or("unknown error");

        let summary = if slides.is_empty() {
            format!(
                "Slide generation failed: none of the {} slides were generated. {reason}",
                generation_metadata.total_slides
            )
        } else {
            format!(
                "Generated {} of {} slides; {} slides failed. {reason}",
                generation_metadata.successful_slides,
                generation_metadata.total_slides,
                generation_metadata.failed_slides
            )
        };
        warn!(
            successful = generation_metadata.successful_slides,
            failed = generation_metadata.failed_slides,
            "reporting slide generation failure"
        );

        let result = SlideResult {
            slides,
            summary,
            generation_metadata,
        };
        if !result.slides.is_empty() {
            persist(self.store.as_ref(), &state, &result).await;
        }
        Ok(SlidePatch {
            processing_metadata: Some(ProcessingMetadata {
                end_time: Some(end),
                ..Default::default()
            }),
            output: Some(result),
            ..Default::default()
        })
    }

    fn handles_errors(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use pipeline::SlideRequest;
    use store::InMemoryDocumentStore;

    use super::*;
    use crate::slides::fixtures::slide;

    fn failed_state(slides: Vec<pipeline::GeneratedSlideContent>, total: usize) -> SlideState {
        let mut state = SlideState::new(SlideRequest::default());
        state.processing_metadata = ProcessingMetadata {
            start_time: Some(Timestamp::now()),
            total_slides: Some(total),
            completed_slides: Some(slides.len()),
            failed_slides: Some(total - slides.len()),
            ..Default::default()
        };
        state.generated_slides = slides;
        state.error = Some("Failed to generate slides".into());
        state
    }

    #[tokio::test]
    async fn partial_failure_keeps_successful_slides_in_order() {
        let patch = ErrorHandler::new(Arc::new(InMemoryDocumentStore::new()))
            .run(Arc::new(failed_state(vec![slide(4, &[]), slide(1, &[])], 3)))
            .await
            .unwrap();
        let result = patch.output.unwrap();
        let order: Vec<u32> = result.slides.iter().map(|s| s.metadata.outline_number).collect();
        assert_eq!(order, vec![1, 4]);
        assert_eq!(result.generation_metadata.failed_slides, 1);
        assert!(result.summary.starts_with("Generated 2 of 3 slides; 1 slides failed."));
    }

    #[tokio::test]
    async fn total_failure_reports_empty_deck() {
        let patch = ErrorHandler::new(Arc::new(InMemoryDocumentStore::new()))
            .run(Arc::new(failed_state(vec![], 2)))
            .await
            .unwrap();
        let result = patch.output.unwrap();
        assert!(result.slides.is_empty());
        assert_eq!(result.generation_metadata.successful_slides, 0);
        assert_eq!(result.generation_metadata.failed_slides, 2);
        assert!(result.summary.contains("none of the 2 slides"));
    }
}
