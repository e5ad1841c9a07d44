//! Terminal outline stage: assembles the output and writes it back.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{DocumentStore, OutlineOutput, PitchError, Record, Stage, Timestamp, PITCHES};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::state::{OutlinePatch, OutlineState};

pub struct Aggregate {
    store: Arc<dyn DocumentStore>,
}

impl Aggregate {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn persist(&self, state: &OutlineState, output: &OutlineOutput) {
        let Some(pitch_id) = state.input.pitch_id.as_ref().filter(|id| !id.is_blank()) else {
            return;
        };
        let mut fields = Record::new();
        fields.insert("initialOutline".into(), Value::String(output.initial_outline.clone()));
        fields.insert(
            "outlineSummary".into(),
            output.summary.clone().map_or(Value::Null, Value::String),
        );
        fields.insert(
            "outlineGeneratedAt".into(),
            Value::String(Timestamp::now().to_string()),
        );
        if let Err(err) = self.store.update(PITCHES, pitch_id.as_str(), fields).await {
            warn!(pitch = %pitch_id, error = %err, "failed to save outline, result is unaffected");
        }
    }
}

fn failure(message: String) -> OutlinePatch {
    OutlinePatch {
        output: Some(OutlineOutput {
            initial_outline: String::new(),
            summary: None,
            error: Some(message.clone()),
        }),
        error: Some(message),
        ..Default::default()
    }
}

#[async_trait]
impl Stage<OutlineState> for Aggregate {
    #[instrument(name = "aggregate", skip_all)]
    async fn run(&self, state: Arc<OutlineState>) -> Result<OutlinePatch, PitchError> {
        if let Some(error) = state.error.as_ref() {
            info!("reporting upstream failure");
            return Ok(failure(error.clone()));
        }
        let Some(outline) = state.outline_text.as_ref().filter(|t| !t.trim().is_empty()) else {
            let err = PitchError::aggregation("no outline text was generated");
            return Ok(failure(err.to_string()));
        };

        let output = OutlineOutput {
            initial_outline: outline.clone(),
            summary: state.outline_summary.clone(),
            error: None,
        };
        self.persist(&state, &output).await;
        info!(chars = outline.len(), "outline assembled");
        Ok(OutlinePatch {
            output: Some(output),
            ..Default::default()
        })
    }

    fn handles_errors(&self) -> bool {
        true
    }
}
