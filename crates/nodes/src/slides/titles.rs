//! Asks for a consistent set of slide titles and applies the ones that change.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{parse_model_json, ChatMessage, ListPatch, PitchError, SlideOutline, Stage};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::state::{SlidePatch, SlideState};
use crate::gateway::{CallPurpose, LlmGateway};

const TITLES_SYSTEM: &str = "You write short, compelling and consistent slide titles for \
banking pitch decks. Titles should read as a storyline when listed in order.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleEntry {
    slide_number: u32,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TitlesReply {
    Wrapped { titles: Vec<TitleEntry> },
    Bare(Vec<TitleEntry>),
}

impl TitlesReply {
    fn into_map(self) -> BTreeMap<u32, String> {
        let entries = match self {
            Self::Wrapped { titles } => titles,
            Self::Bare(titles) => titles,
        };
        entries
            .into_iter()
            .map(|e| (e.slide_number, e.title.trim().to_string()))
            .filter(|(_, title)| !title.is_empty())
            .collect()
    }
}

pub struct TitleEnhancer {
    llm: LlmGateway,
}

impl TitleEnhancer {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }

    async fn propose(&self, state: &SlideState) -> Result<BTreeMap<u32, String>, PitchError> {
        let raw = self
            .llm
            .complete(
                CallPurpose::Titles,
                vec![
                    ChatMessage::system(TITLES_SYSTEM),
                    ChatMessage::user(titles_prompt(state)),
                ],
            )
            .await?;
        Ok(parse_model_json::<TitlesReply>(&raw)?.into_map())
    }
}

pub(crate) fn titles_prompt(state: &SlideState) -> String {
    let outlines: BTreeMap<u32, &SlideOutline> = state
        .input
        .slide_outlines
        .iter()
        .map(|o| (o.number, o))
        .collect();
    let mut slides: Vec<_> = state.generated_slides.iter().collect();
    slides.sort_by_key(|s| s.metadata.outline_number);

    let mut prompt = String::from("Propose one title per slide.\n\n");
    for slide in slides {
        let number = slide.metadata.outline_number;
        prompt.push_str(&format!("Slide {number}: {}\n", slide.content.title));
        if let Some(outline) = outlines.get(&number) {
            if let Some(purpose) = outline.purpose.as_deref() {
                prompt.push_str(&format!("  Purpose: {purpose}\n"));
            }
            if let Some(takeaway) = outline.key_takeaway.as_deref() {
                prompt.push_str(&format!("  Takeaway: {takeaway}\n"));
            }
        }
    }
    prompt.push_str(
        "\nRespond with JSON only: {\"titles\": [{\"slideNumber\": 1, \"title\": \"...\"}]}",
    );
    prompt
}

#[async_trait]
impl Stage<SlideState> for TitleEnhancer {
    #[instrument(name = "title_enhancer", skip_all)]
    async fn run(&self, state: Arc<SlideState>) -> Result<SlidePatch, PitchError> {
        if state.error.is_some() || state.generated_slides.is_empty() {
            return Ok(SlidePatch::default());
        }

        let proposed = match self.propose(&state).await {
            Ok(titles) => titles,
            Err(err) => {
                warn!(error = %err, "title enhancement unavailable, keeping titles");
                return Ok(SlidePatch::default());
            }
        };

        let mut slides = state.generated_slides.clone();
        let mut applied = BTreeMap::new();
        for slide in &mut slides {
            let number = slide.metadata.outline_number;
            let Some(title) = proposed.get(&number) else {
                continue;
            };
            if *title == slide.content.title {
                continue;
            }
            debug!(slide = number, from = %slide.content.title, to = %title, "title replaced");
            slide.content.title = title.clone();
            slide.metadata.enhanced_title = Some(title.clone());
            applied.insert(number, title.clone());
        }

        info!(changed = applied.len(), "titles enhanced");
        if applied.is_empty() {
            return Ok(SlidePatch::default());
        }
        Ok(SlidePatch {
            generated_slides: Some(ListPatch::Replace(slides)),
            enhanced_titles: Some(applied),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{Completion, CompletionRequest, LlmProvider, ModelName, TokenUsage};

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

    async fn enhance(reply: &'static str) -> SlidePatch {
        let mut state = SlideState::default();
        state.generated_slides = vec![slide(1, &[]), slide(2, &[])];
        TitleEnhancer::new(LlmGateway::new(
            Arc::new(Fixed(reply)),
            GenerationOptions::new(ModelName::new("m").unwrap()),
        ))
        .run(Arc::new(state))
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn only_changed_titles_are_applied() {
        let patch = enhance(
            r#"{"titles":[{"slideNumber":1,"title":"Slide 1"},{"slideNumber":2,"title":"Why Acme wins"}]}"#,
        )
        .await;
        assert_eq!(
            patch.enhanced_titles.unwrap(),
            BTreeMap::from([(2, "Why Acme wins".to_string())])
        );
        let Some(ListPatch::Replace(slides)) = patch.generated_slides else {
            panic!("expected slides");
        };
        assert_eq!(slides[0].metadata.enhanced_title, None);
        assert_eq!(slides[1].content.title, "Why Acme wins");
        assert_eq!(slides[1].metadata.enhanced_title.as_deref(), Some("Why Acme wins"));
        assert_eq!(slides[1].metadata.outline_title, "Outline 2");
    }

    #[tokio::test]
    async fn bare_arrays_are_accepted() {
        let patch = enhance(r#"[{"slideNumber":1,"title":"Opening"}]"#).await;
        assert_eq!(patch.enhanced_titles.unwrap()[&1], "Opening");
    }

    #[tokio::test]
    async fn parse_failure_changes_nothing() {
        let patch = enhance("Titles: 1) Opening 2) Close").await;
        assert!(patch.generated_slides.is_none());
        assert!(patch.enhanced_titles.is_none());
        assert!(patch.error.is_none());
    }
}
