//! Revises the slides the reviewer flagged, one at a time.
//!
//! Each revision sees the original slide, the issues naming it and a digest
//! of the rest of the deck. A slide whose revision fails keeps its original
//! content.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    ChatMessage, GeneratedSlideContent, ListPatch, PitchError, ReviewIssue, Stage,
};
use tracing::{debug, info, instrument, warn};

use super::draft::{deck_digest, SlideDraft, SLIDE_JSON_SHAPE};
use super::state::{SlidePatch, SlideState};
use crate::gateway::{CallPurpose, LlmGateway};

const REVISION_SYSTEM: &str = "You revise individual banking pitch slides to fix reviewer \
findings while keeping the deck's narrative consistent.";

pub struct ContentUpdater {
    llm: LlmGateway,
}

impl ContentUpdater {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }

    async fn revise(
        &self,
        slide: &GeneratedSlideContent,
        issues: &[&ReviewIssue],
        siblings: &str,
    ) -> Result<GeneratedSlideContent, PitchError> {
        let raw = self
            .llm
            .complete(
                CallPurpose::Revision,
                vec![
                    ChatMessage::system(REVISION_SYSTEM),
                    ChatMessage::user(revision_prompt(slide, issues, siblings)),
                ],
            )
            .await?;
        let draft = SlideDraft::parse(&raw)?;

        let mut revised = slide.clone();
        revised.slide_type = draft.slide_type;
        revised.content = draft.body;
        revised.metadata.revised = true;
        revised.metadata.revision_reason = Some(revision_reason(issues));
        Ok(revised)
    }
}

fn revision_reason(issues: &[&ReviewIssue]) -> String {
    issues
        .iter()
        .map(|i| {
            if i.description.trim().is_empty() {
                i.issue_type.clone()
            } else {
                format!("{}: {}", i.issue_type, i.description.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn revision_prompt(
    slide: &GeneratedSlideContent,
    issues: &[&ReviewIssue],
    siblings: &str,
) -> String {
    let current = serde_json::to_string_pretty(&serde_json::json!({
        "slideType": slide.slide_type,
        "title": slide.content.title,
        "subtitle": slide.content.subtitle,
        "body": slide.content.body,
        "blocks": slide.content.blocks,
    }))
    .unwrap_or_default();

    let mut findings = String::new();
    for issue in issues {
        findings.push_str(&format!(
            "- [{:?}] {}: {}",
            issue.severity, issue.issue_type, issue.description
        ));
        if let Some(suggestion) = issue.suggestion.as_deref() {
            findings.push_str(&format!(" (suggestion: {suggestion})"));
        }
        findings.push('\n');
    }

    format!(
        "Revise slide {number}.\n\n# Current content\n{current}\n\n# Reviewer findings\n{findings}\n\
# The rest of the deck\n{siblings}\n\n{SLIDE_JSON_SHAPE}",
        number = slide.metadata.outline_number,
    )
}

#[async_trait]
impl Stage<SlideState> for ContentUpdater {
    #[instrument(name = "content_updater", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        if state.error.is_some() {
            return Ok(SlidePatch::default());
        }
        let Some(review) = state.review_results.as_ref() else {
            return Ok(SlidePatch::default());
        };

        let mut slides = state.generated_slides.clone();
        let mut revised = 0usize;
        for i in 0..slides.len() {
            let number = slides[i].metadata.outline_number;
            let issues = review.issues_for(number);
            if issues.is_empty() {
                continue;
            }
            let others: Vec<GeneratedSlideContent> = slides
                .iter()
                .filter(|s| s.metadata.outline_number != number)
                .cloned()
                .collect();
            let siblings = deck_digest(&others);
            match self.revise(&slides[i], &issues, &siblings).await {
                Ok(updated) => {
                    debug!(slide = number, "slide revised");
                    slides[i] = updated;
                    revised += 1;
                }
                Err(err) => {
                    warn!(slide = number, error = %err, "revision failed, keeping original");
                }
            }
        }

        info!(revised, "content update finished");
        if revised == 0 {
            return Ok(SlidePatch::default());
        }
        Ok(SlidePatch {
            generated_slides: Some(ListPatch::Replace(slides)),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pipeline::{
        Completion, CompletionRequest, LlmProvider, ModelName, ReviewResult, ReviewScore,
        Severity, TokenUsage,
    };

    use super::*;
    use crate::gateway::GenerationOptions;
    use crate::slides::fixtures::slide;

    struct Revising {
        prompts: Mutex<Vec<String>>,
        reply: &'static str,
    }

    #[async_trait]
    impl LlmProvider for Revising {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, PitchError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[1].content.clone());
            Ok(Completion {
                content: self.reply.to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn issue(slides: Vec<u32>) -> ReviewIssue {
        ReviewIssue {
            issue_type: "repetitive_content".into(),
            severity: Severity::High,
            affected_slides: slides,
            description: "repeats slide 1".into(),
            suggestion: Some("merge".into()),
        }
    }

    fn state() -> SlideState {
        let mut state = SlideState::default();
        state.generated_slides = vec![slide(1, &[]), slide(2, &[]), slide(3, &[])];
        state.review_results = Some(ReviewResult {
            overall_score: ReviewScore::new(5.0).unwrap(),
            issues: vec![issue(vec![2])],
        });
        state.needs_revision = true;
        state
    }

    fn updater(reply: &'static str) -> (Arc<Revising>, ContentUpdater) {
        let provider = Arc::new(Revising {
            prompts: Mutex::new(Vec::new()),
            reply,
        });
        let llm = LlmGateway::new(
            provider.clone(),
            GenerationOptions::new(ModelName::new("m").unwrap()),
        );
        (provider, ContentUpdater::new(llm))
    }

    #[tokio::test]
    async fn only_implicated_slides_change() {
        let before = state();
        let (provider, stage) = updater(r#"{"title":"Fresh angle","blocks":[]}"#);
        let patch = stage.run(Arc::new(before.clone())).await.unwrap();

        let Some(ListPatch::Replace(after)) = patch.generated_slides else {
            panic!("expected revised slides");
        };
        assert_eq!(after[0], before.generated_slides[0]);
        assert_eq!(after[2], before.generated_slides[2]);
        assert_ne!(after[1], before.generated_slides[1]);
        assert_eq!(after[1].content.title, "Fresh angle");
        assert!(after[1].metadata.revised);
        assert_eq!(
            after[1].metadata.revision_reason.as_deref(),
            Some("repetitive_content: repeats slide 1")
        );

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Slide 1: Slide 1"));
        assert!(prompts[0].contains("Slide 3: Slide 3"));
        assert!(prompts[0].contains("(suggestion: merge)"));
    }

    #[tokio::test]
    async fn unparseable_revision_keeps_original() {
        let (_, stage) = updater("no json here");
        let patch = stage.run(Arc::new(state())).await.unwrap();
        assert!(patch.generated_slides.is_none());
        assert!(patch.error.is_none());
    }
}
