//! Fan-out: one concurrent generation task per slide outline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    settle_all, ChatMessage, ContextData, GeneratedSlideContent, ListPatch, PitchContext,
    PitchError, ProcessingMetadata, SlideOutline, SlideStatus, Stage,
};
use tracing::{info, instrument, warn};

use super::draft::{SlideDraft, SLIDE_JSON_SHAPE};
use super::state::{SlidePatch, SlideState};
use crate::gateway::{CallPurpose, LlmGateway};

const SLIDE_SYSTEM: &str = "You write the content of individual banking pitch slides. \
Be specific, quantified where the material allows, and concise.";

pub struct ParallelGenerate {
    llm: LlmGateway,
}

impl ParallelGenerate {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

fn push_list(prompt: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    prompt.push_str(label);
    prompt.push_str(":\n");
    for item in items {
        prompt.push_str("- ");
        prompt.push_str(item);
        prompt.push('\n');
    }
}

fn push_field(prompt: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        prompt.push_str(&format!("{label}: {}\n", value.trim()));
    }
}

pub(crate) fn slide_prompt(outline: &SlideOutline, pitch: &PitchContext, context: &ContextData) -> String {
    let mut prompt = String::from("# Pitch\n");
    prompt.push_str(&format!("Client: {}\n", pitch.client_name));
    push_field(&mut prompt, "Stage", pitch.pitch_stage.as_deref());
    push_field(&mut prompt, "Industry", pitch.industry.as_deref());
    push_field(&mut prompt, "Objective", pitch.objective.as_deref());
    push_list(&mut prompt, "Competitors", &pitch.competitors);

    prompt.push_str(&format!("\n# Slide {}: {}\n", outline.number, outline.title));
    if !outline.content.trim().is_empty() {
        prompt.push_str(outline.content.trim());
        prompt.push('\n');
    }
    push_field(&mut prompt, "Purpose", outline.purpose.as_deref());
    push_list(&mut prompt, "Key content", &outline.key_content);
    push_field(&mut prompt, "Key takeaway", outline.key_takeaway.as_deref());
    push_list(&mut prompt, "Supporting evidence", &outline.supporting_evidence);
    push_field(&mut prompt, "Visual recommendation", outline.visual_recommendation.as_deref());
    push_field(&mut prompt, "Strategic framing", outline.strategic_framing.as_deref());

    let sources: Vec<_> = context
        .sources
        .iter()
        .filter(|s| !s.content.trim().is_empty())
        .collect();
    if !sources.is_empty() {
        prompt.push_str("\n# Reference material\n");
        for source in sources {
            prompt.push_str(&format!("## {}\n{}\n", source.name, source.content.trim()));
        }
    }

    prompt.push('\n');
    prompt.push_str(SLIDE_JSON_SHAPE);
    prompt
}

impl ParallelGenerate {
    async fn generate_one(
        &self,
        outline: &SlideOutline,
        pitch: &PitchContext,
        context: &ContextData,
    ) -> Result<GeneratedSlideContent, PitchError> {
        let raw = self
            .llm
            .complete(
                CallPurpose::Slide,
                vec![
                    ChatMessage::system(SLIDE_SYSTEM),
                    ChatMessage::user(slide_prompt(outline, pitch, context)),
                ],
            )
            .await?;
        Ok(SlideDraft::parse(&raw)?.into_slide(outline, context))
    }
}

#[async_trait]
impl Stage<SlideState> for ParallelGenerate {
    #[instrument(name = "parallel_generate", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        if state.error.is_some() {
            return Ok(SlidePatch::default());
        }
        let input = &state.input;
        let pitch = input
            .pitch_context
            .as_ref()
            .ok_or_else(|| PitchError::validation("no pitch context provided"))?;
        let context = &input.context_data;
        let outlines = &input.slide_outlines;

        let outcomes = settle_all(outlines.iter(), |outline| {
            self.generate_one(outline, pitch, context)
        })
        .await;

        let mut slides = Vec::with_capacity(outlines.len());
        let mut progress = BTreeMap::new();
        let mut failures = Vec::new();
        for (outline, outcome) in outlines.iter().zip(outcomes) {
            match outcome {
                Ok(slide) => {
                    progress.insert(outline.slide_id(), SlideStatus::Completed);
                    slides.push(slide);
                }
                Err(err) => {
                    warn!(slide = outline.number, error = %err, "slide generation failed");
                    progress.insert(outline.slide_id(), SlideStatus::Failed);
                    failures.push(format!("slide {} ({}): {err}", outline.number, outline.title));
                }
            }
        }

        let error = (!failures.is_empty()).then(|| {
            format!(
                "Failed to generate {} of {} slides: {}",
                failures.len(),
                outlines.len(),
                failures.join("; ")
            )
        });
        info!(
            completed = slides.len(),
            failed = failures.len(),
            "slide fan-out settled"
        );
        Ok(SlidePatch {
            processing_metadata: Some(ProcessingMetadata {
                completed_slides: Some(slides.len()),
                failed_slides: Some(failures.len()),
                ..Default::default()
            }),
            generated_slides: Some(ListPatch::Replace(slides)),
            slide_progress: Some(progress),
            error,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{
        Completion, CompletionRequest, ContextSource, LlmProvider, ModelName, SlideRequest,
        TokenUsage,
    };

    use super::*;
    use crate::gateway::GenerationOptions;

    /// Answers with a slide titled after the prompt's slide heading; fails
    /// for the numbers listed.
    struct Echo {
        fail: Vec<u32>,
    }

    #[async_trait]
    impl LlmProvider for Echo {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, PitchError> {
            let prompt = &request.messages[1].content;
            let number: u32 = prompt
                .split("# Slide ")
                .nth(1)
                .and_then(|rest| rest.split(':').next())
                .and_then(|n| n.parse().ok())
                .unwrap();
            if self.fail.contains(&number) {
                return Err(PitchError::external("rigged failure"));
            }
            Ok(Completion {
                content: format!(r#"{{"title":"Generated {number}","blocks":[]}}"#),
                usage: TokenUsage::default(),
            })
        }
    }

    fn state(count: u32) -> SlideState {
        SlideState::new(SlideRequest {
            slide_outlines: (1..=count)
                .map(|n| serde_json::from_value(serde_json::json!({ "number": n, "title": format!("Outline {n}") })).unwrap())
                .collect(),
            pitch_context: Some(PitchContext {
                client_name: "Acme".into(),
                ..Default::default()
            }),
            context_data: ContextData {
                sources: vec![ContextSource {
                    name: "Client profile".into(),
                    content: "Retailer".into(),
                }],
            },
            ..Default::default()
        })
    }

    fn stage(fail: Vec<u32>) -> ParallelGenerate {
        ParallelGenerate::new(LlmGateway::new(
            Arc::new(Echo { fail }),
            GenerationOptions::new(ModelName::new("m").unwrap()),
        ))
    }

    #[test]
    fn prompt_includes_outline_fields_and_sources() {
        let mut outline: SlideOutline =
            serde_json::from_value(serde_json::json!({ "number": 2, "title": "Why us" })).unwrap();
        outline.key_content = vec!["Coverage".into()];
        let s = state(1);
        let prompt = slide_prompt(&outline, s.input.pitch_context.as_ref().unwrap(), &s.input.context_data);
        assert!(prompt.contains("# Slide 2: Why us"));
        assert!(prompt.contains("Key content:\n- Coverage"));
        assert!(prompt.contains("## Client profile\nRetailer"));
        assert!(prompt.contains("Client: Acme"));
    }

    #[tokio::test]
    async fn all_successes_leave_no_error() {
        let patch = stage(vec![]).run(Arc::new(state(3))).await.unwrap();
        assert!(patch.error.is_none());
        match patch.generated_slides.unwrap() {
            ListPatch::Replace(slides) => assert_eq!(slides.len(), 3),
            ListPatch::Append(_) => panic!("expected a full replace"),
        }
    }

    #[tokio::test]
    async fn partial_failure_keeps_successes_and_reports_each_failure() {
        let patch = stage(vec![2, 4]).run(Arc::new(state(5))).await.unwrap();

        let Some(ListPatch::Replace(slides)) = patch.generated_slides else {
            panic!("expected a full replace");
        };
        let numbers: Vec<u32> = slides.iter().map(|s| s.metadata.outline_number).collect();
        assert_eq!(numbers, vec![1, 3, 5]);

        let progress = patch.slide_progress.unwrap();
        assert_eq!(progress["slide-2"], SlideStatus::Failed);
        assert_eq!(progress["slide-3"], SlideStatus::Completed);

        let meta = patch.processing_metadata.unwrap();
        assert_eq!(meta.completed_slides, Some(3));
        assert_eq!(meta.failed_slides, Some(2));

        let error = patch.error.unwrap();
        assert!(error.starts_with("Failed to generate 2 of 5 slides"));
        assert!(error.contains("slide 2 (Outline 2)"));
        assert!(error.contains("slide 4 (Outline 4)"));
    }
}
