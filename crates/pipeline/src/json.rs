//! Extraction of JSON payloads from free-text model output.
//!
//! Every stage that consumes model output goes through [`parse_model_json`].
//! Candidates are tried in order and the first one that deserialises wins:
//!
//! 1. the body of the first fenced code block (```` ```json ```` or bare ```` ``` ````),
//! 2. the whole response, trimmed,
//! 3. the span from the first `{` to the last `}`, and the span from the first
//!    `[` to the last `]`, whichever starts earlier tried first.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::PitchError;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_-]+)?[ \t]*\r?\n?(.*?)```").expect("static regex")
});

/// Longest excerpt of the raw text quoted in a parse error.
const EXCERPT_CHARS: usize = 120;

/// Parses a `T` out of `raw` model output.
///
/// Returns [`PitchError::ContentParse`] if no candidate deserialises.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, PitchError> {
    let mut last_error = None;
    for candidate in candidates(raw) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err),
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "response is empty".to_string());
    Err(PitchError::content_parse(format!(
        "{reason} (response starts: {:?})",
        excerpt(raw)
    )))
}

fn candidates(raw: &str) -> Vec<&str> {
    let mut out = Vec::with_capacity(4);
    if let Some(body) = FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        out.push(body.as_str().trim());
    }
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| delimited_span(trimmed, open, close))
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    out.extend(spans.into_iter().map(|(_, span)| span));
    out.retain(|c| !c.is_empty());
    out.dedup();
    out
}

fn delimited_span(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

fn excerpt(raw: &str) -> String {
    raw.trim().chars().take(EXCERPT_CHARS).collect()
}
