//! [`StaticSettings`]: stage templates fixed at start-up.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pipeline::{PitchError, SettingsProvider, StageTemplate};

/// Serves stage templates from a fixed map keyed by canonical stage name.
///
/// Stages with nothing configured return `None`, leaving the caller to fall
/// back to its built-in template.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    templates: BTreeMap<String, StageTemplate>,
}

impl StaticSettings {
    pub fn new(templates: BTreeMap<String, StageTemplate>) -> Self {
        Self { templates }
    }

    pub fn with_template(mut self, stage: impl Into<String>, template: StageTemplate) -> Self {
        self.templates.insert(stage.into(), template);
        self
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn stage_template(&self, stage: &str) -> Result<Option<StageTemplate>, PitchError> {
        Ok(self.templates.get(stage).cloned())
    }
}
