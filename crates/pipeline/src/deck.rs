//! Request, result, and content types exchanged with the two generation
//! pipelines.
//!
//! All types serialise with camelCase field names so a host application can
//! pass its JSON payloads through unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{ClientId, CompetitorId, PitchId, ReviewScore, Severity, ThreadId, Timestamp};

/// A schemaless document-store record.
pub type Record = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Outline pipeline
// ---------------------------------------------------------------------------

/// A file the caller uploaded as supporting material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// File name as shown to the user.
    pub name: String,
    /// Optional category label (e.g. `"financials"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Input to the outline pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineRequest {
    /// Pitch record the finished outline is written back to.
    pub pitch_id: Option<PitchId>,
    /// Stored client to fetch. Either this or `client_name` is required.
    pub client_id: Option<ClientId>,
    /// Client name used for lookup when no id is given.
    pub client_name: Option<String>,
    /// Pitch stage key, canonical or legacy (`stage1`..`stage5`).
    pub pitch_stage: Option<String>,
    /// Competitor selection; only `true` entries are fetched.
    pub competitors_selected: BTreeMap<CompetitorId, bool>,
    /// Caller-side client fields, taking precedence over the stored record.
    pub client_details: Option<Record>,
    /// Caller-side competitor fields keyed by competitor id.
    pub competitor_details: BTreeMap<CompetitorId, Record>,
    /// Optional data-source categories the caller ticked.
    pub data_sources: BTreeMap<String, bool>,
    /// Supporting files the caller uploaded.
    pub uploaded_files: Vec<UploadedFile>,
    /// Slide structure overriding the configured stage template.
    pub custom_slide_structure: Option<String>,
    /// Free-text: key facts about the client.
    pub important_client_info: Option<String>,
    /// Free-text: what matters most to the client.
    pub important_to_client: Option<String>,
    /// Free-text: lessons from previous pitches.
    pub lessons_learnt: Option<String>,
    /// Free-text: anything else the writer should follow.
    pub additional_instructions: Option<String>,
}

/// The value the outline aggregator writes into state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineOutput {
    pub initial_outline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What `run_outline_pipeline` hands back. Failures surface in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineResult {
    pub initial_outline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub thread_id: ThreadId,
}

// ---------------------------------------------------------------------------
// Slide pipeline — inputs
// ---------------------------------------------------------------------------

/// One planned slide's structured brief. Consumed read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideOutline {
    /// Position in the deck; final slide order follows this field.
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_content: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_takeaway: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting_evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_framing: Option<String>,
}

impl SlideOutline {
    /// Key used for this slide in progress maps.
    pub fn slide_id(&self) -> String {
        format!("slide-{}", self.number)
    }
}

/// Pitch-level framing shared by every slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PitchContext {
    pub client_name: String,
    pub pitch_stage: Option<String>,
    pub industry: Option<String>,
    pub objective: Option<String>,
    pub competitors: Vec<String>,
}

/// A named block of reference material (client profile, market data, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSource {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// Reference material shared read-only by every slide task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextData {
    pub sources: Vec<ContextSource>,
}

impl ContextData {
    /// Names of the sources that actually carry content.
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|s| !s.content.trim().is_empty())
            .map(|s| s.name.clone())
            .collect()
    }
}

/// Input to the slide pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlideRequest {
    pub pitch_id: Option<PitchId>,
    pub slide_outlines: Vec<SlideOutline>,
    pub pitch_context: Option<PitchContext>,
    pub context_data: ContextData,
}

// ---------------------------------------------------------------------------
// Slide pipeline — generated content
// ---------------------------------------------------------------------------

/// Layout tag for a generated slide. Unknown tags read as `Content`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideType {
    Title,
    Agenda,
    Comparison,
    Data,
    Closing,
    #[default]
    #[serde(other)]
    Content,
}

/// One typed block on a slide. The block's own fields stay schemaless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Record,
}

/// The visible content of one slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideBody {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: String,
    pub blocks: Vec<ContentBlock>,
}

/// Provenance for one generated slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideMetadata {
    pub generated_at: Timestamp,
    /// `number` of the source [`SlideOutline`].
    pub outline_number: u32,
    /// `title` of the source [`SlideOutline`], kept when titles are enhanced.
    pub outline_title: String,
    pub context_sources: Vec<String>,
    #[serde(default)]
    pub revised: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_title: Option<String>,
}

/// One slide's LLM-produced structured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSlideContent {
    pub id: String,
    pub slide_type: SlideType,
    pub content: SlideBody,
    pub metadata: SlideMetadata,
}

// ---------------------------------------------------------------------------
// Slide pipeline — bookkeeping
// ---------------------------------------------------------------------------

/// Per-slide generation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideStatus {
    Pending,
    Completed,
    Failed,
}

/// Counters and timestamps for a slide run.
///
/// Merged field by field: a patch only overwrites the fields it sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_slides: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_slides: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_slides: Option<usize>,
}

impl ProcessingMetadata {
    /// Shallow merge: fields set in `patch` win, the rest are kept.
    pub fn merge(&mut self, patch: ProcessingMetadata) {
        if patch.start_time.is_some() {
            self.start_time = patch.start_time;
        }
        if patch.end_time.is_some() {
            self.end_time = patch.end_time;
        }
        if patch.total_slides.is_some() {
            self.total_slides = patch.total_slides;
        }
        if patch.completed_slides.is_some() {
            self.completed_slides = patch.completed_slides;
        }
        if patch.failed_slides.is_some() {
            self.failed_slides = patch.failed_slides;
        }
    }
}

/// One reviewer finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub severity: Severity,
    #[serde(default, deserialize_with = "lenient_slide_numbers")]
    pub affected_slides: Vec<u32>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// The reviewer's verdict on the whole deck.
///
/// Deserialisation is lenient: a score given as a string still counts, an
/// unusable score reads as neutral, and malformed issues are dropped one by
/// one rather than discarding the whole review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    #[serde(default, deserialize_with = "lenient_score")]
    pub overall_score: ReviewScore,
    #[serde(default, deserialize_with = "lenient_issues")]
    pub issues: Vec<ReviewIssue>,
}

/// `4`, `"4"`, `"4.5"` and `"4/10"` all read as a number.
fn number_in(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.split('/').next()?.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ReviewScore, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_in(&value)
        .and_then(ReviewScore::new)
        .unwrap_or_default())
}

fn lenient_issues<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ReviewIssue>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    let total = items.len();
    let issues: Vec<ReviewIssue> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if issues.len() < total {
        tracing::debug!(dropped = total - issues.len(), "skipped malformed review issues");
    }
    Ok(issues)
}

/// Accepts `[2, "3", "Slide 4"]` as well as a single number or string.
fn lenient_slide_numbers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
    fn slide_number(value: &Value) -> Option<u32> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => {
                let digits: String = s
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(char::is_ascii_digit)
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(slide_number).collect(),
        other => slide_number(&other).into_iter().collect(),
    })
}

impl ReviewResult {
    /// A low score or any high-severity issue sends the deck for revision.
    pub fn needs_revision(&self) -> bool {
        self.overall_score.needs_revision()
            || self.issues.iter().any(|i| i.severity == Severity::High)
    }

    /// Issues that name `slide_number` among their affected slides.
    pub fn issues_for(&self, slide_number: u32) -> Vec<&ReviewIssue> {
        self.issues
            .iter()
            .filter(|i| i.affected_slides.contains(&slide_number))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Slide pipeline — result
// ---------------------------------------------------------------------------

/// Counts and provenance reported with a slide result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub total_slides: usize,
    pub successful_slides: usize,
    pub failed_slides: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub processing_time: u64,
    pub context_sources: Vec<String>,
}

/// What `run_slide_pipeline` hands back on success (full or partial).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideResult {
    pub slides: Vec<GeneratedSlideContent>,
    pub summary: String,
    pub generation_metadata: GenerationMetadata,
}
