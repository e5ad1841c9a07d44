//! The JSON shape the model is asked to return for one slide.

use pipeline::{
    parse_model_json, ContentBlock, ContextData, GeneratedSlideContent, PitchError, SlideBody,
    SlideMetadata, SlideOutline, SlideType, Timestamp,
};
use serde::Deserialize;

/// Shape description included in every prompt that asks for slide JSON.
pub(crate) const SLIDE_JSON_SHAPE: &str = r#"Respond with a single JSON object and nothing else:
{
  "slideType": "title" | "agenda" | "content" | "comparison" | "data" | "closing",
  "title": "slide title",
  "subtitle": "optional subtitle",
  "body": "one or two sentence lead-in",
  "blocks": [
    { "type": "bullets", "items": ["..."] },
    { "type": "metric", "label": "...", "value": "..." },
    { "type": "quote", "text": "...", "source": "..." }
  ]
}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraft {
    #[serde(default)]
    slide_type: Option<SlideType>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    blocks: Option<Vec<ContentBlock>>,
}

/// A validated slide draft: it has a title and a blocks list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SlideDraft {
    pub slide_type: SlideType,
    pub body: SlideBody,
}

impl SlideDraft {
    /// Parses and validates model output.
    pub fn parse(raw: &str) -> Result<Self, PitchError> {
        let draft: RawDraft = parse_model_json(raw)?;
        let title = draft
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PitchError::content_parse("slide JSON has no title"))?;
        let blocks = draft
            .blocks
            .ok_or_else(|| PitchError::content_parse("slide JSON has no blocks list"))?;
        Ok(Self {
            slide_type: draft.slide_type.unwrap_or_default(),
            body: SlideBody {
                title,
                subtitle: draft.subtitle.filter(|s| !s.trim().is_empty()),
                body: draft.body.unwrap_or_default(),
                blocks,
            },
        })
    }

    /// Builds the generated slide for `outline`.
    pub fn into_slide(self, outline: &SlideOutline, context: &ContextData) -> GeneratedSlideContent {
        GeneratedSlideContent {
            id: outline.slide_id(),
            slide_type: self.slide_type,
            content: self.body,
            metadata: SlideMetadata {
                generated_at: Timestamp::now(),
                outline_number: outline.number,
                outline_title: outline.title.clone(),
                context_sources: context.source_names(),
                revised: false,
                revision_reason: None,
                enhanced_title: None,
            },
        }
    }
}

/// Short per-slide text used to give the model a view of the whole deck.
pub(crate) fn deck_digest(slides: &[GeneratedSlideContent]) -> String {
    let mut sorted: Vec<&GeneratedSlideContent> = slides.iter().collect();
    sorted.sort_by_key(|s| s.metadata.outline_number);
    sorted
        .iter()
        .map(|s| {
            let mut line = format!("Slide {}: {}", s.metadata.outline_number, s.content.title);
            let lead = s.content.body.trim();
            if !lead.is_empty() {
                line.push_str(" | ");
                line.push_str(&lead.chars().take(160).collect::<String>());
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
