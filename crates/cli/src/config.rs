//! `pitchcraft.toml` loading and validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use llm::{AnthropicConfig, DEFAULT_BASE_URL};
use nodes::templates::canonical_stage;
use nodes::GenerationOptions;
use pipeline::{ModelName, StageTemplate};
use serde::Deserialize;
use store::StaticSettings;

/// Top-level configuration, deserialised from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    pub llm: LlmSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    /// Stage templates keyed by stage name; legacy `stageN` keys are accepted.
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateSection>,
}

/// `[llm]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSection {
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for outline and slide writing.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Bound on one LLM call, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// `[store]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// JSON snapshot that seeds the store and receives results.
    pub data_file: Option<PathBuf>,
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    #[serde(default)]
    pub json_logs: bool,
    /// OTLP/gRPC collector endpoint. Span export is off when absent.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            json_logs: false,
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

/// `[templates.<stage>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSection {
    #[serde(default)]
    pub slide_structure: Vec<String>,
    #[serde(default)]
    pub key_principles: Vec<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    nodes::DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_max_retries() -> u32 {
    3
}

fn default_service_name() -> String {
    "pitchcraft".to_string()
}

impl CliConfig {
    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let llm = &self.llm;
        if llm.model.trim().is_empty() {
            bail!("llm.model must name a model");
        }
        if llm.max_tokens == 0 {
            bail!("llm.max_tokens must be positive");
        }
        if llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be positive");
        }
        if let Some(t) = llm.temperature {
            if !(0.0..=1.0).contains(&t) {
                bail!("llm.temperature must be between 0 and 1, got {t}");
            }
        }
        if llm.api_key_env.trim().is_empty() {
            bail!("llm.api_key_env must name an environment variable");
        }
        for (stage, template) in &self.templates {
            if template.slide_structure.iter().all(|s| s.trim().is_empty()) {
                bail!("templates.{stage}.slide_structure is empty");
            }
        }
        Ok(())
    }

    pub fn generation_options(&self) -> Result<GenerationOptions> {
        let model = ModelName::new(self.llm.model.trim())
            .context("llm.model must name a model")?;
        let mut options = GenerationOptions::new(model);
        options.max_tokens = Some(self.llm.max_tokens);
        options.call_timeout = Duration::from_secs(self.llm.timeout_secs);
        if let Some(t) = self.llm.temperature {
            options.creative_temperature = t;
        }
        Ok(options)
    }

    pub fn anthropic_config(&self, api_key: String) -> AnthropicConfig {
        let mut config = AnthropicConfig::new(api_key);
        config.base_url = self.llm.base_url.clone();
        config.default_max_tokens = self.llm.max_tokens;
        config.max_retries = self.llm.max_retries;
        config.request_timeout = Duration::from_secs(self.llm.timeout_secs);
        config
    }

    /// Configured templates keyed by canonical stage name.
    pub fn settings(&self) -> StaticSettings {
        self.templates
            .iter()
            .fold(StaticSettings::default(), |settings, (stage, template)| {
                settings.with_template(
                    canonical_stage(Some(stage.as_str())),
                    StageTemplate {
                        slide_structure_list: template.slide_structure.clone(),
                        key_principles_list: template.key_principles.clone(),
                    },
                )
            })
    }
}
