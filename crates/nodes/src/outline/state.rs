//! State and patch types for the outline pipeline.

use pipeline::state::{merge_error, replace, replace_value};
use pipeline::{OutlineOutput, OutlineRequest, PipelineState, Record};
use serde::{Deserialize, Serialize};

/// Client record with every prompt-relevant field filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedClient {
    pub name: String,
    pub industry: String,
    pub size: String,
    pub revenue: String,
    /// Remaining record fields, passed through to the prompt.
    pub details: Record,
}

/// Competitor record normalised for the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedCompetitor {
    pub id: String,
    pub name: String,
    pub industry: String,
    /// `true` for ad-hoc competitors typed in by the user.
    pub manual: bool,
    pub details: Record,
}

/// Accumulated state of one outline run.
#[derive(Debug, Clone, Default)]
pub struct OutlineState {
    /// Request payload; set once at start, never patched.
    pub input: OutlineRequest,
    pub client_data: Option<Record>,
    pub competitor_data: Vec<Record>,
    pub enhanced_client_data: Option<EnhancedClient>,
    pub enhanced_competitor_data: Vec<EnhancedCompetitor>,
    pub data_source_content: Option<String>,
    pub outline_text: Option<String>,
    pub outline_summary: Option<String>,
    pub output: Option<OutlineOutput>,
    pub error: Option<String>,
}

impl OutlineState {
    pub fn new(input: OutlineRequest) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }
}

/// Partial update returned by an outline stage. Every field replaces.
#[derive(Debug, Default)]
pub struct OutlinePatch {
    pub client_data: Option<Record>,
    pub competitor_data: Option<Vec<Record>>,
    pub enhanced_client_data: Option<EnhancedClient>,
    pub enhanced_competitor_data: Option<Vec<EnhancedCompetitor>>,
    pub data_source_content: Option<String>,
    pub outline_text: Option<String>,
    pub outline_summary: Option<String>,
    pub output: Option<OutlineOutput>,
    pub error: Option<String>,
}

impl PipelineState for OutlineState {
    type Patch = OutlinePatch;

    fn merge(&mut self, patch: OutlinePatch) {
        replace(&mut self.client_data, patch.client_data);
        replace_value(&mut self.competitor_data, patch.competitor_data);
        replace(&mut self.enhanced_client_data, patch.enhanced_client_data);
        replace_value(&mut self.enhanced_competitor_data, patch.enhanced_competitor_data);
        replace(&mut self.data_source_content, patch.data_source_content);
        replace(&mut self.outline_text, patch.outline_text);
        replace(&mut self.outline_summary, patch.outline_summary);
        replace(&mut self.output, patch.output);
        merge_error(&mut self.error, patch.error);
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn error_patch(message: String) -> OutlinePatch {
        OutlinePatch {
            error: Some(message),
            ..Default::default()
        }
    }

    fn writes_output(patch: &OutlinePatch) -> bool {
        patch.output.is_some()
    }
}
