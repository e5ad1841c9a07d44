//! Builds the outline prompt and makes the outline and summary calls.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{ChatMessage, PitchError, SettingsProvider, Stage, StageTemplate};
use tracing::{info, instrument, warn};

use super::state::{OutlinePatch, OutlineState};
use crate::format::format_outline;
use crate::gateway::{CallPurpose, LlmGateway};
use crate::templates::{canonical_stage, resolve_stage_template};

const OUTLINE_SYSTEM: &str = "You are a senior banking pitch strategist. Write clear, \
client-specific pitch deck outlines in markdown. Use one `## Slide N: Title` heading per slide \
and short bullet points under each.";

const SUMMARY_SYSTEM: &str = "You summarise pitch deck outlines for busy bankers. Reply with \
three to five sentences of plain text, no headings or bullets.";

pub struct Generate {
    settings: Arc<dyn SettingsProvider>,
    llm: LlmGateway,
}

impl Generate {
    pub fn new(settings: Arc<dyn SettingsProvider>, llm: LlmGateway) -> Self {
        Self { settings, llm }
    }

    /// A caller-supplied structure replaces the configured slide list; the
    /// stage's principles still apply.
    async fn template(&self, state: &OutlineState) -> StageTemplate {
        let mut template =
            resolve_stage_template(self.settings.as_ref(), state.input.pitch_stage.as_deref()).await;
        if let Some(custom) = state.input.custom_slide_structure.as_deref() {
            let slides = custom_structure(custom);
            if !slides.is_empty() {
                template.slide_structure_list = slides;
            }
        }
        template
    }
}

/// One slide per non-blank line, with any leading list marker removed.
fn custom_structure(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•'))
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn push_section(prompt: &mut String, heading: &str, body: &str) {
    prompt.push_str("## ");
    prompt.push_str(heading);
    prompt.push('\n');
    prompt.push_str(body.trim());
    prompt.push_str("\n\n");
}

fn push_optional(prompt: &mut String, heading: &str, body: Option<&str>) {
    if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
        push_section(prompt, heading, body);
    }
}

pub(crate) fn outline_prompt(state: &OutlineState, template: &StageTemplate) -> String {
    let input = &state.input;
    let mut prompt = String::new();

    let client = match &state.enhanced_client_data {
        Some(client) => {
            let mut text = format!(
                "Name: {}\nIndustry: {}\nSize: {}\nRevenue: {}",
                client.name, client.industry, client.size, client.revenue
            );
            for (key, value) in &client.details {
                text.push_str(&format!("\n{key}: {value}"));
            }
            text
        }
        None => format!(
            "Name: {}\n(No stored client profile was found.)",
            input.client_name.as_deref().unwrap_or("Unknown Client")
        ),
    };
    push_section(&mut prompt, "Client", &client);

    if state.enhanced_competitor_data.is_empty() {
        push_section(&mut prompt, "Competitors", "None selected.");
    } else {
        let competitors = state
            .enhanced_competitor_data
            .iter()
            .map(|c| {
                let mut line = format!("- {} ({})", c.name, c.industry);
                if c.manual {
                    line.push_str(" [entered manually]");
                }
                for (key, value) in &c.details {
                    line.push_str(&format!("; {key}: {value}"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n");
        push_section(&mut prompt, "Competitors", &competitors);
    }

    push_optional(&mut prompt, "Data Sources", state.data_source_content.as_deref());
    push_optional(&mut prompt, "Important Client Information", input.important_client_info.as_deref());
    push_optional(&mut prompt, "What Matters To The Client", input.important_to_client.as_deref());
    push_optional(&mut prompt, "Lessons Learnt", input.lessons_learnt.as_deref());
    push_optional(&mut prompt, "Additional Instructions", input.additional_instructions.as_deref());

    push_section(
        &mut prompt,
        "Pitch Stage",
        canonical_stage(input.pitch_stage.as_deref()),
    );

    let structure = template
        .slide_structure_list
        .iter()
        .enumerate()
        .map(|(i, slide)| format!("{}. {slide}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    push_section(&mut prompt, "Slide Structure", &structure);

    if !template.key_principles_list.is_empty() {
        let principles = template
            .key_principles_list
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n");
        push_section(&mut prompt, "Key Principles", &principles);
    }

    prompt.push_str(
        "Write the full pitch outline following the slide structure above. For every slide give \
its purpose, key content, key takeaway, supporting evidence and a visual recommendation.",
    );
    prompt
}

#[async_trait]
impl Stage<OutlineState> for Generate {
    #[instrument(name = "generate", skip_all)]
    async fn run(&self, state: Arc<OutlineState>) -> Result<OutlinePatch, PitchError> {
        if state.error.is_some() {
            return Ok(OutlinePatch::default());
        }

        let template = self.template(&state).await;
        let prompt = outline_prompt(&state, &template);

        let raw = self
            .llm
            .complete(
                CallPurpose::Outline,
                vec![ChatMessage::system(OUTLINE_SYSTEM), ChatMessage::user(prompt)],
            )
            .await?;
        let outline = format_outline(&raw);
        if outline.is_empty() {
            return Err(PitchError::content_parse("outline response was empty"));
        }

        let summary = match self
            .llm
            .complete(
                CallPurpose::OutlineSummary,
                vec![
                    ChatMessage::system(SUMMARY_SYSTEM),
                    ChatMessage::user(format!("Summarise this pitch outline:\n\n{outline}")),
                ],
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "summary call failed, continuing without a summary");
                None
            }
        };

        info!(
            slides = template.slide_structure_list.len(),
            chars = outline.len(),
            has_summary = summary.is_some(),
            "outline generated"
        );
        Ok(OutlinePatch {
            outline_text: Some(outline),
            outline_summary: summary,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use pipeline::{
        Completion, CompletionRequest, LlmProvider, ModelName, OutlineRequest, TokenUsage,
    };

    use super::*;
    use crate::gateway::GenerationOptions;
    use crate::outline::state::EnhancedClient;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, PitchError>>>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, PitchError> {
            let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            let reply = self.replies.lock().unwrap().pop_front().expect("unscripted call")?;
            Ok(Completion {
                content: reply,
                usage: TokenUsage::default(),
            })
        }
    }

    struct NoTemplates;

    #[async_trait]
    impl SettingsProvider for NoTemplates {
        async fn stage_template(&self, _: &str) -> Result<Option<StageTemplate>, PitchError> {
            Ok(None)
        }
    }

    fn stage(replies: Vec<Result<String, PitchError>>) -> (Arc<Scripted>, Generate) {
        let provider = Arc::new(Scripted {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        });
        let llm = LlmGateway::new(
            provider.clone(),
            GenerationOptions::new(ModelName::new("test-model").unwrap()),
        );
        (provider, Generate::new(Arc::new(NoTemplates), llm))
    }

    fn acme_state() -> OutlineState {
        let mut state = OutlineState::new(OutlineRequest {
            pitch_stage: Some("stage2".into()),
            lessons_learnt: Some("Lead with pricing".into()),
            ..Default::default()
        });
        state.enhanced_client_data = Some(EnhancedClient {
            name: "Acme".into(),
            industry: "Retail".into(),
            size: "Unknown Size".into(),
            revenue: "Unknown Revenue".into(),
            details: Default::default(),
        });
        state
    }

    #[test]
    fn custom_structure_strips_list_markers() {
        assert_eq!(
            custom_structure("1. Cover\n\n2) Market\n- Close  \n"),
            vec!["Cover", "Market", "Close"]
        );
    }

    #[test]
    fn prompt_carries_client_stage_and_free_text() {
        let prompt = outline_prompt(&acme_state(), &crate::templates::fallback_template());
        assert!(prompt.contains("Name: Acme"));
        assert!(prompt.contains("opportunity_identification"));
        assert!(prompt.contains("Lead with pricing"));
        assert!(prompt.contains("14. Next Steps"));
        assert!(!prompt.contains("Additional Instructions"));
    }

    #[tokio::test]
    async fn outline_is_formatted_and_summarised() {
        let (provider, stage) = stage(vec![
            Ok("##Slide 1: Acme overview\nBody • one • two\n\n\n".into()),
            Ok(" A short summary. ".into()),
        ]);
        let patch = stage.run(Arc::new(acme_state())).await.unwrap();
        assert_eq!(
            patch.outline_text.as_deref(),
            Some("## Slide 1: Acme overview\n\nBody\n- one\n- two")
        );
        assert_eq!(patch.outline_summary.as_deref(), Some("A short summary."));
        assert!(provider.prompts.lock().unwrap()[1].contains("## Slide 1: Acme overview"));
    }

    #[tokio::test]
    async fn custom_structure_overrides_template() {
        let (provider, stage) = stage(vec![Ok("# Outline".into()), Ok("sum".into())]);
        let mut state = acme_state();
        state.input.custom_slide_structure = Some("Cover\nAsk".into());
        stage.run(Arc::new(state)).await.unwrap();
        let prompt = provider.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("1. Cover\n2. Ask"));
        assert!(!prompt.contains("3. "));
        assert!(prompt.contains("Key Principles"));
    }

    #[tokio::test]
    async fn summary_failure_is_not_fatal() {
        let (_, stage) = stage(vec![
            Ok("# Outline".into()),
            Err(PitchError::external("quota exceeded")),
        ]);
        let patch = stage.run(Arc::new(acme_state())).await.unwrap();
        assert_eq!(patch.outline_text.as_deref(), Some("# Outline"));
        assert!(patch.outline_summary.is_none());
    }

    #[tokio::test]
    async fn outline_failures_propagate() {
        let (_, failing) = stage(vec![Err(PitchError::external("down"))]);
        assert!(matches!(
            failing.run(Arc::new(acme_state())).await,
            Err(PitchError::ExternalCall { .. })
        ));

        let (_, blank) = stage(vec![Ok("  \n\n".into())]);
        assert!(matches!(
            blank.run(Arc::new(acme_state())).await,
            Err(PitchError::ContentParse { .. })
        ));
    }
}
