use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub scheduler: Option<SchedulerConfig>,
    pub pipeline: Option<PipelineConfig>,
    pub relevance: Option<RelevanceConfig>,
    pub listing: Option<ListingConfig>,
    pub llm: Option<LlmConfig>,
    pub classifier: Option<ClassifierConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: Option<bool>,
    pub initial_delay_secs: Option<u64>,
    pub full_refresh_interval_hours: Option<u64>,
    pub quick_interval_hours: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub recent_window_hours: Option<u64>,
    pub ingest_skip_threshold: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RelevanceConfig {
    pub base: Option<i64>,
    pub per_source: Option<i64>,
    pub per_lean: Option<i64>,
    pub recency_per_hour: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ListingConfig {
    pub stories_per_page: Option<usize>,
    pub max_ranked_records: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// "ollama", "groq" or "together"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Shell command printing the API key, for rotating tokens.
    pub api_key_command: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub summary_max_chars: Option<usize>,
    pub backfill_delay_ms: Option<u64>,
    pub backfill_limit: Option<usize>,
    pub classify_new_records: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
