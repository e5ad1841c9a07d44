//! Slide fixtures shared by the stage tests.

use pipeline::{GeneratedSlideContent, SlideBody, SlideMetadata, SlideType, Timestamp};

pub(crate) fn slide(number: u32, sources: &[&str]) -> GeneratedSlideContent {
    GeneratedSlideContent {
        id: format!("slide-{number}"),
        slide_type: SlideType::Content,
        content: SlideBody {
            title: format!("Slide {number}"),
            subtitle: None,
            body: format!("Body {number}"),
            blocks: vec![],
        },
        metadata: SlideMetadata {
            generated_at: Timestamp::now(),
            outline_number: number,
            outline_title: format!("Outline {number}"),
            context_sources: sources.iter().map(|s| s.to_string()).collect(),
            revised: false,
            revision_reason: None,
            enhanced_title: None,
        },
    }
}
