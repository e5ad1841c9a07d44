//! Validates the request and seeds progress tracking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{PitchError, ProcessingMetadata, SlideStatus, Stage, Timestamp};
use tracing::{info, instrument};

use super::state::{SlidePatch, SlideState};

pub struct Initialize;

#[async_trait]
impl Stage<SlideState> for Initialize {
    #[instrument(name = "initialize", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        if state.error.is_some() {
            return Ok(SlidePatch::default());
        }
        let input = &state.input;
        if input.slide_outlines.is_empty() {
            return Err(PitchError::validation("no slide outlines provided"));
        }
        if input.pitch_context.is_none() {
            return Err(PitchError::validation("no pitch context provided"));
        }
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = input.slide_outlines.iter().find(|o| !seen.insert(o.number)) {
            return Err(PitchError::validation(format!(
                "slide number {} appears more than once",
                duplicate.number
            )));
        }

        let progress: BTreeMap<String, SlideStatus> = input
            .slide_outlines
            .iter()
            .map(|o| (o.slide_id(), SlideStatus::Pending))
            .collect();
        let total = input.slide_outlines.len();

        info!(slides = total, "slide run initialised");
        Ok(SlidePatch {
            slide_progress: Some(progress),
            processing_metadata: Some(ProcessingMetadata {
                start_time: Some(Timestamp::now()),
                end_time: None,
                total_slides: Some(total),
                completed_slides: Some(0),
                failed_slides: Some(0),
            }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{PitchContext, SlideOutline, SlideRequest};

    use super::*;

    fn outline(number: u32) -> SlideOutline {
        serde_json::from_value(serde_json::json!({ "number": number, "title": "T" })).unwrap()
    }

    #[tokio::test]
    async fn outlines_and_context_are_required() {
        let empty = Initialize
            .run(Arc::new(SlideState::new(SlideRequest {
                pitch_context: Some(PitchContext::default()),
                ..Default::default()
            })))
            .await
            .unwrap_err();
        assert!(matches!(empty, PitchError::Validation { .. }));

        let no_context = Initialize
            .run(Arc::new(SlideState::new(SlideRequest {
                slide_outlines: vec![outline(1)],
                ..Default::default()
            })))
            .await
            .unwrap_err();
        assert!(no_context.to_string().contains("pitch context"));
    }

    #[tokio::test]
    async fn outline_numbers_must_be_unique() {
        let err = Initialize
            .run(Arc::new(SlideState::new(SlideRequest {
                slide_outlines: vec![outline(1), outline(2), outline(1)],
                pitch_context: Some(PitchContext::default()),
                ..Default::default()
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, PitchError::Validation { .. }));
        assert!(err.to_string().contains("slide number 1 appears more than once"));
    }

    #[tokio::test]
    async fn progress_is_seeded_pending() {
        let patch = Initialize
            .run(Arc::new(SlideState::new(SlideRequest {
                slide_outlines: vec![outline(1), outline(2)],
                pitch_context: Some(PitchContext::default()),
                ..Default::default()
            })))
            .await
            .unwrap();
        let progress = patch.slide_progress.unwrap();
        assert_eq!(progress.len(), 2);
        assert!(progress.values().all(|s| *s == SlideStatus::Pending));
        let meta = patch.processing_metadata.unwrap();
        assert_eq!(meta.total_slides, Some(2));
        assert_eq!(meta.failed_slides, Some(0));
        assert!(meta.start_time.is_some());
    }
}
