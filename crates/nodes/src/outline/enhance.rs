//! Normalises fetched records and describes the caller's selected sources.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{OutlineRequest, PitchError, Record, Stage};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::state::{EnhancedClient, EnhancedCompetitor, OutlinePatch, OutlineState};

pub struct Enhance;

/// Reads a record field as display text. Numbers and booleans are rendered.
pub(crate) fn text_field(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn remaining(record: &Record, known: &[&str]) -> Record {
    record
        .iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub(crate) fn enhance_client(record: &Record, fallback_name: Option<&str>) -> EnhancedClient {
    EnhancedClient {
        name: text_field(record, "name")
            .or_else(|| fallback_name.map(str::to_string))
            .unwrap_or_else(|| "Unknown Client".into()),
        industry: text_field(record, "industry").unwrap_or_else(|| "Unknown Industry".into()),
        size: text_field(record, "size").unwrap_or_else(|| "Unknown Size".into()),
        revenue: text_field(record, "revenue").unwrap_or_else(|| "Unknown Revenue".into()),
        details: remaining(record, &["name", "industry", "size", "revenue"]),
    }
}

pub(crate) fn enhance_competitor(record: &Record) -> EnhancedCompetitor {
    EnhancedCompetitor {
        id: text_field(record, "id").unwrap_or_default(),
        name: text_field(record, "name").unwrap_or_else(|| "Unknown Competitor".into()),
        industry: text_field(record, "industry").unwrap_or_else(|| "Unknown Industry".into()),
        manual: matches!(record.get("manual"), Some(Value::Bool(true))),
        details: remaining(record, &["id", "name", "industry", "manual"]),
    }
}

/// `"marketData"` / `"market_data"` → `"Market Data"`.
fn humanise(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-readable summary of selected data-source categories and uploads.
pub(crate) fn describe_data_sources(input: &OutlineRequest) -> String {
    let selected: Vec<String> = input
        .data_sources
        .iter()
        .filter(|(_, on)| **on)
        .map(|(key, _)| humanise(key))
        .collect();

    let mut text = String::new();
    if selected.is_empty() && input.uploaded_files.is_empty() {
        text.push_str("No additional data sources were selected.");
        return text;
    }
    if !selected.is_empty() {
        text.push_str("Selected data sources:\n");
        for name in &selected {
            text.push_str(&format!("- {name}\n"));
        }
    }
    if !input.uploaded_files.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("Uploaded files:\n");
        for file in &input.uploaded_files {
            match &file.category {
                Some(category) => text.push_str(&format!("- {} ({category})\n", file.name)),
                None => text.push_str(&format!("- {}\n", file.name)),
            }
        }
    }
    text.trim_end().to_string()
}

#[async_trait]
impl Stage<OutlineState> for Enhance {
    #[instrument(name = "enhance", skip_all)]
    async fn run(&self, state: Arc<OutlineState>) -> Result<OutlinePatch, PitchError> {
        if state.error.is_some() {
            return Ok(OutlinePatch::default());
        }
        let data_source_content = describe_data_sources(&state.input);

        let Some(client) = state.client_data.as_ref() else {
            warn!("no client data, skipping enhancement");
            return Ok(OutlinePatch {
                data_source_content: Some(data_source_content),
                ..Default::default()
            });
        };

        let fallback_name = state.input.client_name.as_deref();
        let enhanced_client = enhance_client(client, fallback_name);
        let competitors: Vec<EnhancedCompetitor> =
            state.competitor_data.iter().map(enhance_competitor).collect();

        info!(client = %enhanced_client.name, competitors = competitors.len(), "enhanced pitch data");
        Ok(OutlinePatch {
            enhanced_client_data: Some(enhanced_client),
            enhanced_competitor_data: Some(competitors),
            data_source_content: Some(data_source_content),
            ..Default::default()
        })
    }
}
