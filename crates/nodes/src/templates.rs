//! Stage-template resolution.
//!
//! Pitch stages are keyed by canonical names; older requests still send
//! `stage1`..`stage5`, which are translated first. When the settings
//! provider has nothing configured for a stage (or fails), the built-in
//! fourteen-slide template is used so the outline prompt is never empty.

use pipeline::{SettingsProvider, StageTemplate};
use tracing::{debug, warn};

/// Legacy stage keys and the canonical names they map to.
pub const LEGACY_STAGE_KEYS: [(&str, &str); 5] = [
    ("stage1", "relationship_building"),
    ("stage2", "opportunity_identification"),
    ("stage3", "solution_development"),
    ("stage4", "proposal_presentation"),
    ("stage5", "deal_execution"),
];

/// Stage assumed when a request names none.
pub const DEFAULT_STAGE: &str = "relationship_building";

const FALLBACK_SLIDE_STRUCTURE: [&str; 14] = [
    "Title Slide: client name, pitch title, date and presenting team",
    "Executive Summary: the core proposition in three to five points",
    "Client Situation Overview: current position, recent performance and strategic priorities",
    "Market & Industry Context: sector trends, regulatory backdrop and peer activity",
    "Key Challenges & Opportunities: the issues the client must address and where value lies",
    "Our Understanding of Client Objectives: restated goals in the client's own terms",
    "Proposed Solution Overview: the recommended approach at a glance",
    "Solution Deep Dive: products, structure, mechanics and expected outcomes",
    "Competitive Differentiation: why us versus the alternatives the client is considering",
    "Relevant Credentials & Case Studies: comparable mandates and measurable results",
    "Team & Coverage Model: who will serve the client and how",
    "Implementation Roadmap: phases, milestones and decision points",
    "Commercial Framework: pricing approach, value delivered and terms",
    "Next Steps & Call to Action: concrete actions, owners and dates",
];

const FALLBACK_KEY_PRINCIPLES: [&str; 13] = [
    "Lead with the client's priorities, not our product catalogue",
    "Every slide carries one clear, stated takeaway",
    "Quantify value wherever the data allows",
    "Ground claims in the supplied client and market data",
    "Address competitor strengths directly and fairly",
    "Keep the narrative flowing logically from problem to solution to action",
    "Use the client's terminology and reflect their strategic language",
    "Prefer concise bullet points over dense paragraphs",
    "Highlight risks alongside mitigations",
    "Tailor depth and tone to the pitch stage",
    "Make differentiation specific and evidenced",
    "Recommend a visual for every data-heavy slide",
    "Close with unambiguous next steps",
];

/// The built-in template used when nothing is configured.
pub fn fallback_template() -> StageTemplate {
    StageTemplate {
        slide_structure_list: FALLBACK_SLIDE_STRUCTURE.iter().map(|s| s.to_string()).collect(),
        key_principles_list: FALLBACK_KEY_PRINCIPLES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Translates a legacy key to its canonical name; canonical names pass through.
pub fn canonical_stage(key: Option<&str>) -> &str {
    let key = match key.map(str::trim) {
        Some(k) if !k.is_empty() => k,
        _ => return DEFAULT_STAGE,
    };
    LEGACY_STAGE_KEYS
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(key))
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key)
}

/// Looks up the template for `stage`, falling back to [`fallback_template`].
pub async fn resolve_stage_template(
    settings: &dyn SettingsProvider,
    stage: Option<&str>,
) -> StageTemplate {
    let canonical = canonical_stage(stage);
    match settings.stage_template(canonical).await {
        Ok(Some(template)) if !template.is_empty() => {
            debug!(stage = canonical, "using configured stage template");
            template
        }
        Ok(_) => {
            debug!(stage = canonical, "no stage template configured, using fallback");
            fallback_template()
        }
        Err(err) => {
            warn!(stage = canonical, error = %err, "stage template lookup failed, using fallback");
            fallback_template()
        }
    }
}
