//! Shared doubles for the pipeline scenario tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodes::{Collaborators, GenerationOptions, LlmGateway};
use pipeline::{
    Completion, CompletionRequest, ContextData, ContextSource, LlmProvider, ModelName,
    PitchContext, PitchError, SlideOutline, SlideRequest, TokenUsage,
};
use store::{InMemoryDocumentStore, StaticSettings};

/// Answers each call by recognising which stage built the prompt.
///
/// Slide and revision replies echo the slide number they were asked for,
/// so concurrent fan-out calls need no ordering.
pub struct FakeLlm {
    pub outline: String,
    pub review: String,
    pub titles: String,
    pub failing_slides: BTreeSet<u32>,
    pub prompts: Mutex<Vec<String>>,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            outline: "# Acme pitch\n## Slide 1: Introduction\n- Who we are".into(),
            review: r#"{"overallScore": 8, "issues": []}"#.into(),
            titles: r#"{"titles": []}"#.into(),
            failing_slides: BTreeSet::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLlm {
    pub fn prompts_starting_with(&self, prefix: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect()
    }
}

fn number_after(prompt: &str, marker: &str) -> u32 {
    let rest = &prompt[prompt.find(marker).expect("marker present") + marker.len()..];
    rest.chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .expect("slide number")
}

fn slide_json(title: &str, number: u32) -> String {
    serde_json::json!({
        "slideType": "content",
        "title": title,
        "body": format!("Body {number}"),
        "blocks": [{ "type": "bullets", "items": [format!("Point {number}")] }]
    })
    .to_string()
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, PitchError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());

        let content = if prompt.starts_with("Summarise this pitch outline") {
            "A pitch for Acme.".to_string()
        } else if prompt.starts_with("# Pitch\n") {
            let number = number_after(&prompt, "\n# Slide ");
            if self.failing_slides.contains(&number) {
                return Err(PitchError::external("model overloaded"));
            }
            slide_json(&format!("Draft {number}"), number)
        } else if prompt.starts_with("Review this deck") {
            self.review.clone()
        } else if prompt.starts_with("Revise slide ") {
            let number = number_after(&prompt, "Revise slide ");
            slide_json(&format!("Revised {number}"), number)
        } else if prompt.starts_with("Propose one title") {
            self.titles.clone()
        } else {
            self.outline.clone()
        };
        Ok(Completion {
            content,
            usage: TokenUsage::default(),
        })
    }
}

pub fn collaborators(llm: Arc<FakeLlm>, store: Arc<InMemoryDocumentStore>) -> Collaborators {
    let gateway = LlmGateway::new(
        llm,
        GenerationOptions::new(ModelName::new("test-model").unwrap()),
    );
    Collaborators::new(store, Arc::new(StaticSettings::default()), gateway)
}

pub fn outline(number: u32) -> SlideOutline {
    SlideOutline {
        number,
        title: format!("Outline {number}"),
        content: format!("What slide {number} covers"),
        purpose: None,
        key_content: Vec::new(),
        key_takeaway: None,
        supporting_evidence: Vec::new(),
        visual_recommendation: None,
        strategic_framing: None,
    }
}

pub fn slide_request(numbers: impl IntoIterator<Item = u32>) -> SlideRequest {
    SlideRequest {
        pitch_id: None,
        slide_outlines: numbers.into_iter().map(outline).collect(),
        pitch_context: Some(PitchContext {
            client_name: "Acme".into(),
            ..Default::default()
        }),
        context_data: ContextData {
            sources: vec![
                ContextSource {
                    name: "Client profile".into(),
                    content: "Acme sells hardware.".into(),
                },
                ContextSource {
                    name: "Market data".into(),
                    content: "  ".into(),
                },
            ],
        },
    }
}
