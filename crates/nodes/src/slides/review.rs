//! Whole-deck review. A review that cannot be obtained is treated as a pass.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    parse_model_json, ChatMessage, GeneratedSlideContent, PitchError, ReviewResult, Stage,
};
use serde_json::json;
use tracing::{info, instrument, warn};

use super::state::{SlidePatch, SlideState};
use crate::gateway::{CallPurpose, LlmGateway};

const REVIEW_SYSTEM: &str = "You are a demanding reviewer of banking pitch decks. Look for \
repetitive content across slides, gaps in the narrative and weak or unsupported slides.";

const REVIEW_SHAPE: &str = r#"Respond with a single JSON object and nothing else:
{
  "overallScore": 1-10,
  "issues": [
    {
      "type": "repetitive_content" | "narrative_gap" | "quality",
      "severity": "HIGH" | "MEDIUM" | "LOW",
      "affectedSlides": [slide numbers],
      "description": "what is wrong",
      "suggestion": "how to fix it"
    }
  ]
}"#;

pub struct Reviewer {
    llm: LlmGateway,
}

impl Reviewer {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }

    async fn review(&self, slides: &[GeneratedSlideContent]) -> Result<ReviewResult, PitchError> {
        let raw = self
            .llm
            .complete(
                CallPurpose::Review,
                vec![
                    ChatMessage::system(REVIEW_SYSTEM),
                    ChatMessage::user(review_prompt(slides)),
                ],
            )
            .await?;
        parse_model_json(&raw)
    }
}

pub(crate) fn review_prompt(slides: &[GeneratedSlideContent]) -> String {
    let mut ordered: Vec<&GeneratedSlideContent> = slides.iter().collect();
    ordered.sort_by_key(|s| s.metadata.outline_number);
    let deck: Vec<_> = ordered
        .iter()
        .map(|s| {
            json!({
                "slideNumber": s.metadata.outline_number,
                "title": s.content.title,
                "subtitle": s.content.subtitle,
                "body": s.content.body,
                "blocks": s.content.blocks,
            })
        })
        .collect();
    let deck = serde_json::to_string_pretty(&deck).unwrap_or_default();
    format!("Review this deck of {} slides:\n\n{deck}\n\n{REVIEW_SHAPE}", slides.len())
}

#[async_trait]
impl Stage<SlideState> for Reviewer {
    #[instrument(name = "reviewer", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        if state.error.is_some() {
            return Ok(SlidePatch::default());
        }

        let review = match self.review(&state.generated_slides).await {
            Ok(review) => review,
            Err(err) => {
                warn!(error = %err, "review unavailable, assuming a neutral score");
                ReviewResult::default()
            }
        };
        let needs_revision = review.needs_revision();
        info!(
            score = %review.overall_score,
            issues = review.issues.len(),
            needs_revision,
            "deck reviewed"
        );
        Ok(SlidePatch {
            review_results: Some(review),
            needs_revision: Some(needs_revision),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{Completion, CompletionRequest, LlmProvider, ModelName, Severity, TokenUsage};

    use super::*;
    use crate::gateway::GenerationOptions;
    use crate::slides::fixtures::slide;

    struct Fixed(&'static str);

    #[async_trait]
    impl LlmProvider for Fixed {
        async fn complete(&self, _: CompletionRequest) -> Result<Completion, PitchError> {
            Ok(Completion {
                content: self.0.to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    async fn review(reply: &'static str) -> SlidePatch {
        let mut state = SlideState::default();
        state.generated_slides = vec![slide(1, &[]), slide(2, &[])];
        Reviewer::new(LlmGateway::new(
            Arc::new(Fixed(reply)),
            GenerationOptions::new(ModelName::new("m").unwrap()),
        ))
        .run(Arc::new(state))
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn high_severity_issue_requests_revision() {
        let patch = review(
            r#"```json
{"overallScore": 8, "issues": [{"type":"repetitive_content","severity":"HIGH","affectedSlides":[2]}]}
```"#,
        )
        .await;
        assert_eq!(patch.needs_revision, Some(true));
        let results = patch.review_results.unwrap();
        assert_eq!(results.issues[0].severity, Severity::High);
        assert_eq!(results.issues_for(2).len(), 1);
    }

    #[tokio::test]
    async fn low_score_requests_revision() {
        let patch = review(r#"{"overallScore": 5, "issues": []}"#).await;
        assert_eq!(patch.needs_revision, Some(true));
    }

    #[tokio::test]
    async fn good_deck_passes() {
        let patch = review(r#"{"overallScore": 9, "issues": [{"type":"quality","severity":"LOW","affectedSlides":[1]}]}"#).await;
        assert_eq!(patch.needs_revision, Some(false));
    }

    #[tokio::test]
    async fn garbage_falls_back_to_neutral_pass() {
        let patch = review("I could not review this deck, sorry.").await;
        assert_eq!(patch.needs_revision, Some(false));
        let results = patch.review_results.unwrap();
        assert_eq!(results.overall_score.as_f64(), 7.0);
        assert!(results.issues.is_empty());
    }

    #[tokio::test]
    async fn unknown_severity_does_not_hide_the_rest_of_the_review() {
        let patch = review(
            r#"{"overallScore": 4, "issues": [
                {"type": "quality", "severity": "CRITICAL", "affectedSlides": [1], "description": "odd label"},
                {"type": "narrative_gap", "severity": "HIGH", "affectedSlides": [2], "description": "jump"}
            ]}"#,
        )
        .await;
        assert_eq!(patch.needs_revision, Some(true));
        let results = patch.review_results.unwrap();
        assert_eq!(results.overall_score.as_f64(), 4.0);
        assert_eq!(results.issues.len(), 2);
        assert_eq!(results.issues[0].severity, Severity::Unknown);
        assert_eq!(results.issues_for(2)[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn score_given_as_text_still_counts() {
        let patch = review(r#"{"overallScore": "4", "issues": []}"#).await;
        assert_eq!(patch.needs_revision, Some(true));
        assert_eq!(patch.review_results.unwrap().overall_score.as_f64(), 4.0);
    }

    #[tokio::test]
    async fn slide_references_given_as_text_are_resolved() {
        let patch = review(
            r#"{"overallScore": 8, "issues": [
                {"type": "quality", "severity": "MEDIUM", "affectedSlides": ["Slide 2", "1"]},
                {"type": "quality", "affectedSlides": [1]}
            ]}"#,
        )
        .await;
        let results = patch.review_results.unwrap();
        assert_eq!(results.issues.len(), 1);
        assert_eq!(results.issues[0].affected_slides, vec![2, 1]);
        assert_eq!(patch.needs_revision, Some(false));
    }

    #[test]
    fn prompt_lists_slides_in_order() {
        let prompt = review_prompt(&[slide(2, &[]), slide(1, &[])]);
        let first = prompt.find("\"Slide 1\"").unwrap();
        let second = prompt.find("\"Slide 2\"").unwrap();
        assert!(first < second);
        assert!(prompt.contains("overallScore"));
    }
}
