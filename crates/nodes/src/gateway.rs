//! The single path every stage takes to reach the LLM.
//!
//! [`LlmGateway`] pins the model, applies per-purpose temperatures and a
//! per-call timeout, and logs token usage. A timeout is reported as
//! [`PitchError::ExternalCall`], so each stage's existing failure rule
//! applies to it unchanged.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{ChatMessage, CompletionRequest, LlmProvider, ModelName, PitchError};
use tracing::{debug, instrument, warn};

/// Default bound on a single LLM call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// What a call is for. Selects the temperature and labels logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPurpose {
    Outline,
    OutlineSummary,
    Slide,
    Review,
    Revision,
    Titles,
}

impl CallPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::OutlineSummary => "outline_summary",
            Self::Slide => "slide",
            Self::Review => "review",
            Self::Revision => "revision",
            Self::Titles => "titles",
        }
    }
}

/// Model and sampling settings shared by every call in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub model: ModelName,
    pub max_tokens: Option<u32>,
    pub call_timeout: Duration,
    /// Used for outline and slide writing.
    pub creative_temperature: f32,
    /// Used for review and title selection.
    pub analytical_temperature: f32,
}

impl GenerationOptions {
    pub fn new(model: ModelName) -> Self {
        Self {
            model,
            max_tokens: Some(4096),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            creative_temperature: 0.7,
            analytical_temperature: 0.3,
        }
    }

    fn temperature_for(&self, purpose: CallPurpose) -> f32 {
        match purpose {
            CallPurpose::Outline | CallPurpose::Slide | CallPurpose::Revision => {
                self.creative_temperature
            }
            CallPurpose::OutlineSummary | CallPurpose::Review | CallPurpose::Titles => {
                self.analytical_temperature
            }
        }
    }
}

/// Wraps an [`LlmProvider`] with the run's [`GenerationOptions`].
#[derive(Clone)]
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Sends `messages` and returns the response text.
    #[instrument(skip(self, messages), fields(purpose = purpose.as_str(), model = %self.options.model))]
    pub async fn complete(
        &self,
        purpose: CallPurpose,
        messages: Vec<ChatMessage>,
    ) -> Result<String, PitchError> {
        let request = CompletionRequest {
            messages,
            model: self.options.model.clone(),
            temperature: Some(self.options.temperature_for(purpose)),
            max_tokens: self.options.max_tokens,
        };

        match tokio::time::timeout(self.options.call_timeout, self.provider.complete(request)).await
        {
            Ok(Ok(completion)) => {
                debug!(
                    input_tokens = completion.usage.input.as_u64(),
                    output_tokens = completion.usage.output.as_u64(),
                    chars = completion.content.len(),
                    "completion received"
                );
                Ok(completion.content)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "completion failed");
                Err(err)
            }
            Err(_) => {
                warn!(timeout = ?self.options.call_timeout, "completion timed out");
                Err(PitchError::external(format!(
                    "{} call timed out after {}s",
                    purpose.as_str(),
                    self.options.call_timeout.as_secs_f32()
                )))
            }
        }
    }
}
