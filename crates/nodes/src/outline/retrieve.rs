//! Fetches the client and selected competitor records.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    CompetitorId, DocumentStore, PitchError, Record, Stage, CLIENTS, COMPETITORS,
    MANUAL_COMPETITOR_PREFIX,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::state::{OutlinePatch, OutlineState};

pub struct Retrieve {
    store: Arc<dyn DocumentStore>,
}

impl Retrieve {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Best-effort fetch; a miss or a store failure is logged and yields `None`.
    async fn lookup(&self, collection: &str, id: &str) -> Option<Record> {
        match self.store.get(collection, id).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                let miss = PitchError::LookupFailure {
                    collection: collection.into(),
                    id: id.into(),
                };
                warn!(%miss, "record not found, continuing without it");
                None
            }
            Err(err) => {
                warn!(collection, id, error = %err, "lookup failed, continuing without it");
                None
            }
        }
    }

    async fn lookup_client_by_name(&self, name: &str) -> Option<Record> {
        match self
            .store
            .query(CLIENTS, "name", &Value::String(name.to_string()))
            .await
        {
            Ok(records) => {
                let found = records.into_iter().next();
                if found.is_none() {
                    warn!(name, "no client record matches name, continuing without it");
                }
                found
            }
            Err(err) => {
                warn!(name, error = %err, "client query failed, continuing without it");
                None
            }
        }
    }

    async fn competitor(&self, id: &CompetitorId, overlay: Option<&Record>) -> Option<Record> {
        let mut record = if id.is_manual() {
            let mut manual = Record::new();
            let name = id
                .as_str()
                .trim_start_matches(MANUAL_COMPETITOR_PREFIX)
                .trim();
            manual.insert("name".into(), Value::String(name.to_string()));
            manual.insert("manual".into(), Value::Bool(true));
            manual
        } else {
            self.lookup(COMPETITORS, id.as_str()).await?
        };
        record
            .entry("id")
            .or_insert_with(|| Value::String(id.to_string()));
        if let Some(fields) = overlay {
            overlay_fields(&mut record, fields);
        }
        Some(record)
    }
}

/// Caller-supplied fields win over stored ones.
fn overlay_fields(record: &mut Record, overlay: &Record) {
    for (key, value) in overlay {
        record.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl Stage<OutlineState> for Retrieve {
    #[instrument(name = "retrieve", skip_all)]
    async fn run(&self, state: Arc<OutlineState>) -> Result<OutlinePatch, PitchError> {
        if state.error.is_some() {
            return Ok(OutlinePatch::default());
        }
        let input = &state.input;

        let client_id = input.client_id.as_ref().filter(|id| !id.is_blank());
        let client_name = input
            .client_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let fetched = match (client_id, client_name) {
            (Some(id), _) => self.lookup(CLIENTS, id.as_str()).await,
            (None, Some(name)) => self.lookup_client_by_name(name).await,
            (None, None) => return Err(PitchError::validation("missing client identifier")),
        };

        let client_data = match (fetched, input.client_details.as_ref()) {
            (Some(mut record), Some(overlay)) => {
                overlay_fields(&mut record, overlay);
                Some(record)
            }
            (None, Some(overlay)) => Some(overlay.clone()),
            (record, None) => record,
        };

        let mut competitor_data = Vec::new();
        for (id, _) in input.competitors_selected.iter().filter(|(_, on)| **on) {
            if let Some(record) = self
                .competitor(id, input.competitor_details.get(id))
                .await
            {
                competitor_data.push(record);
            } else {
                debug!(competitor = %id, "skipping competitor");
            }
        }

        info!(
            client_found = client_data.is_some(),
            competitors = competitor_data.len(),
            "retrieved pitch data"
        );
        Ok(OutlinePatch {
            client_data,
            competitor_data: Some(competitor_data),
            ..Default::default()
        })
    }
}
