//! State and patch types for the slide pipeline.

use std::collections::BTreeMap;

use pipeline::state::{append_or_replace, merge_error, replace, replace_value, shallow_merge};
use pipeline::{
    GeneratedSlideContent, ListPatch, PipelineState, ProcessingMetadata, ReviewResult,
    SlideRequest, SlideResult, SlideStatus,
};

/// Accumulated state of one slide run.
#[derive(Debug, Clone, Default)]
pub struct SlideState {
    /// Request payload; set once at start, never patched.
    pub input: SlideRequest,
    pub generated_slides: Vec<GeneratedSlideContent>,
    /// Keyed by [`pipeline::SlideOutline::slide_id`].
    pub slide_progress: BTreeMap<String, SlideStatus>,
    pub processing_metadata: ProcessingMetadata,
    pub review_results: Option<ReviewResult>,
    pub needs_revision: bool,
    /// Keyed by outline number.
    pub enhanced_titles: BTreeMap<u32, String>,
    pub output: Option<SlideResult>,
    pub error: Option<String>,
}

impl SlideState {
    pub fn new(input: SlideRequest) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }
}

/// Partial update returned by a slide stage.
#[derive(Debug, Default)]
pub struct SlidePatch {
    pub generated_slides: Option<ListPatch<GeneratedSlideContent>>,
    pub slide_progress: Option<BTreeMap<String, SlideStatus>>,
    pub processing_metadata: Option<ProcessingMetadata>,
    pub review_results: Option<ReviewResult>,
    pub needs_revision: Option<bool>,
    pub enhanced_titles: Option<BTreeMap<u32, String>>,
    pub output: Option<SlideResult>,
    pub error: Option<String>,
}

impl PipelineState for SlideState {
    type Patch = SlidePatch;

    fn merge(&mut self, patch: SlidePatch) {
        append_or_replace(&mut self.generated_slides, patch.generated_slides);
        shallow_merge(&mut self.slide_progress, patch.slide_progress);
        if let Some(meta) = patch.processing_metadata {
            self.processing_metadata.merge(meta);
        }
        replace(&mut self.review_results, patch.review_results);
        replace_value(&mut self.needs_revision, patch.needs_revision);
        shallow_merge(&mut self.enhanced_titles, patch.enhanced_titles);
        replace(&mut self.output, patch.output);
        merge_error(&mut self.error, patch.error);
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn error_patch(message: String) -> SlidePatch {
        SlidePatch {
            error: Some(message),
            ..Default::default()
        }
    }

    fn writes_output(patch: &SlidePatch) -> bool {
        patch.output.is_some()
    }
}
