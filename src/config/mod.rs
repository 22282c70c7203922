mod file_config;

pub use file_config::{
    ClassifierConfig, FileConfig, ListingConfig, LlmConfig, PipelineConfig, RelevanceConfig,
    SchedulerConfig,
};

use crate::llm::LlmSettings;
use crate::ranking::RelevanceWeights;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Environment flag that opts into the background scheduler.
pub const ENABLE_SCHEDULER_ENV: &str = "ENABLE_SCHEDULER";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub enable_scheduler: bool,
    pub full_refresh_interval_hours: Option<u64>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub scheduler: SchedulerSettings,
    pub pipeline: PipelineSettings,
    pub relevance: RelevanceWeights,
    pub listing: ListingSettings,
    pub llm: LlmSettings,
    pub classifier: ClassifierSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present; `ENABLE_SCHEDULER=true`
    /// in the environment turns the scheduler on regardless.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        Self::resolve_with_env(cli, file_config, |key| std::env::var(key).ok())
    }

    pub(crate) fn resolve_with_env<F>(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Scheduler: opt-in only
        let sched_file = file.scheduler.unwrap_or_default();
        let env_enabled = env(ENABLE_SCHEDULER_ENV)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let defaults = SchedulerSettings::default();
        let scheduler = SchedulerSettings {
            enabled: env_enabled || sched_file.enabled.unwrap_or(cli.enable_scheduler),
            initial_delay: sched_file
                .initial_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.initial_delay),
            full_refresh_interval: sched_file
                .full_refresh_interval_hours
                .or(cli.full_refresh_interval_hours)
                .map(|h| checked_hours("scheduler.full_refresh_interval_hours", h))
                .transpose()?
                .unwrap_or(defaults.full_refresh_interval),
            quick_interval: sched_file
                .quick_interval_hours
                .map(|h| checked_hours("scheduler.quick_interval_hours", h))
                .transpose()?
                .unwrap_or(defaults.quick_interval),
        };
        scheduler.validate()?;

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline_defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            recent_window_hours: pipeline_file
                .recent_window_hours
                .unwrap_or(pipeline_defaults.recent_window_hours),
            ingest_skip_threshold: pipeline_file
                .ingest_skip_threshold
                .unwrap_or(pipeline_defaults.ingest_skip_threshold),
        };
        if pipeline.recent_window_hours == 0 {
            bail!("pipeline.recent_window_hours must be greater than zero");
        }
        checked_hours("pipeline.recent_window_hours", pipeline.recent_window_hours)?;

        let rel_file = file.relevance.unwrap_or_default();
        let rel_defaults = RelevanceWeights::default();
        let relevance = RelevanceWeights {
            base: rel_file.base.unwrap_or(rel_defaults.base),
            per_source: rel_file.per_source.unwrap_or(rel_defaults.per_source),
            per_lean: rel_file.per_lean.unwrap_or(rel_defaults.per_lean),
            recency_per_hour: rel_file
                .recency_per_hour
                .unwrap_or(rel_defaults.recency_per_hour),
        };
        if !relevance.is_valid() {
            bail!("Relevance weights must be non-negative: {:?}", relevance);
        }

        let listing_file = file.listing.unwrap_or_default();
        let listing_defaults = ListingSettings::default();
        let listing = ListingSettings {
            stories_per_page: listing_file
                .stories_per_page
                .unwrap_or(listing_defaults.stories_per_page),
            max_ranked_records: listing_file
                .max_ranked_records
                .unwrap_or(listing_defaults.max_ranked_records),
        };
        if listing.stories_per_page == 0 || listing.max_ranked_records == 0 {
            bail!("listing.stories_per_page and listing.max_ranked_records must be greater than zero");
        }

        // Provider selection and credentials are validated when the provider is built
        let llm_file = file.llm.unwrap_or_default();
        let llm_defaults = LlmSettings::default();
        let llm = LlmSettings {
            provider: llm_file
                .provider
                .or_else(|| cli.llm_provider.clone())
                .unwrap_or(llm_defaults.provider),
            model: llm_file
                .model
                .or_else(|| cli.llm_model.clone())
                .unwrap_or(llm_defaults.model),
            base_url: llm_file.base_url,
            api_key: llm_file.api_key,
            api_key_command: llm_file.api_key_command,
            temperature: llm_file.temperature.unwrap_or(llm_defaults.temperature),
            max_tokens: llm_file.max_tokens.or(llm_defaults.max_tokens),
            timeout_secs: llm_file.timeout_secs.unwrap_or(llm_defaults.timeout_secs),
        };

        let cls_file = file.classifier.unwrap_or_default();
        let cls_defaults = ClassifierSettings::default();
        let classifier = ClassifierSettings {
            max_retries: cls_file.max_retries.unwrap_or(cls_defaults.max_retries),
            retry_delay: cls_file
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(cls_defaults.retry_delay),
            summary_max_chars: cls_file
                .summary_max_chars
                .unwrap_or(cls_defaults.summary_max_chars),
            backfill_delay: cls_file
                .backfill_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(cls_defaults.backfill_delay),
            backfill_limit: cls_file
                .backfill_limit
                .unwrap_or(cls_defaults.backfill_limit),
            classify_new_records: cls_file
                .classify_new_records
                .unwrap_or(cls_defaults.classify_new_records),
        };
        if classifier.max_retries == 0 {
            bail!("classifier.max_retries must be at least 1");
        }

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            scheduler,
            pipeline,
            relevance,
            listing,
            llm,
            classifier,
        })
    }

    pub fn news_db_path(&self) -> PathBuf {
        self.db_dir.join("news.db")
    }
}

/// Largest accepted hour-based setting, ten years.
const MAX_HOURS: u64 = 10 * 365 * 24;

fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}

fn checked_hours(key: &str, h: u64) -> Result<Duration> {
    if h > MAX_HOURS {
        bail!("{} must be at most {} hours, got {}", key, MAX_HOURS, h);
    }
    Ok(hours(h))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub enabled: bool,
    /// Delay before the one-shot "initial" run.
    pub initial_delay: Duration,
    pub full_refresh_interval: Duration,
    pub quick_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_secs(60),
            full_refresh_interval: hours(6),
            quick_interval: hours(1),
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.full_refresh_interval.is_zero() {
            bail!("scheduler.full_refresh_interval_hours must be greater than zero");
        }
        if self.quick_interval.is_zero() {
            bail!("scheduler.quick_interval_hours must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Trailing window used to count recently ingested items.
    pub recent_window_hours: u64,
    /// A smart run skips ingestion when at least this many items are recent.
    pub ingest_skip_threshold: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            recent_window_hours: 2,
            ingest_skip_threshold: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingSettings {
    pub stories_per_page: usize,
    /// Newest records considered before ranking and pagination.
    pub max_ranked_records: usize,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            stories_per_page: 12,
            max_ranked_records: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    /// Total provider attempts per classification.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub summary_max_chars: usize,
    pub backfill_delay: Duration,
    pub backfill_limit: usize,
    /// Classify records as pipeline runs create them.
    pub classify_new_records: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            summary_max_chars: 1000,
            backfill_delay: Duration::from_millis(500),
            backfill_limit: 100,
            classify_new_records: false,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn cli_with_dir(temp_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(temp_dir.path().to_path_buf()),
            port: 5000,
            metrics_port: 9091,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("body"),
            Some(RequestsLoggingLevel::Body)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), None, no_env).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.scheduler, SchedulerSettings::default());
        assert!(!config.scheduler.enabled);
        assert_eq!(config.pipeline.recent_window_hours, 2);
        assert_eq!(config.pipeline.ingest_skip_threshold, 50);
        assert_eq!(config.relevance, RelevanceWeights::default());
        assert_eq!(config.listing.stories_per_page, 12);
        assert_eq!(config.llm.provider, "groq");
        assert_eq!(config.classifier.max_retries, 3);
        assert_eq!(config.classifier.retry_delay, Duration::from_secs(2));
        assert!(!config.classifier.classify_new_records);
        assert_eq!(config.news_db_path(), temp_dir.path().join("news.db"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            port: 3001,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::Path,
            full_refresh_interval_hours: Some(12),
            llm_provider: Some("together".to_string()),
            ..Default::default()
        };
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            scheduler: Some(SchedulerConfig {
                full_refresh_interval_hours: Some(3),
                ..Default::default()
            }),
            llm: Some(LlmConfig {
                provider: Some("ollama".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve_with_env(&cli, Some(file_config), no_env).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.scheduler.full_refresh_interval, hours(3));
        assert_eq!(config.llm.provider, "ollama");
        // CLI value used when TOML doesn't specify
        assert_eq!(config.metrics_port, 9091);
    }

    #[test]
    fn test_cli_interval_used_without_toml() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            full_refresh_interval_hours: Some(12),
            ..cli_with_dir(&temp_dir)
        };
        let config = AppConfig::resolve_with_env(&cli, None, no_env).unwrap();
        assert_eq!(config.scheduler.full_refresh_interval, hours(12));
    }

    #[test]
    fn test_scheduler_enabled_from_env() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), None, |key| {
            (key == ENABLE_SCHEDULER_ENV).then(|| "TRUE".to_string())
        })
        .unwrap();
        assert!(config.scheduler.enabled);

        let config = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), None, |_| {
            Some("yes".to_string())
        })
        .unwrap();
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn test_scheduler_enabled_from_cli_or_toml() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            enable_scheduler: true,
            ..cli_with_dir(&temp_dir)
        };
        assert!(
            AppConfig::resolve_with_env(&cli, None, no_env)
                .unwrap()
                .scheduler
                .enabled
        );

        let file_config = FileConfig {
            scheduler: Some(SchedulerConfig {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(
            !AppConfig::resolve_with_env(&cli, Some(file_config), no_env)
                .unwrap()
                .scheduler
                .enabled
        );
    }

    #[test]
    fn test_rejects_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            scheduler: Some(SchedulerConfig {
                quick_interval_hours: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err =
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file_config), no_env)
                .unwrap_err();
        assert!(err.to_string().contains("quick_interval_hours"));
    }

    #[test]
    fn test_rejects_out_of_range_hours() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            full_refresh_interval_hours: Some(u64::MAX / 1000),
            ..cli_with_dir(&temp_dir)
        };
        let err = AppConfig::resolve_with_env(&cli, None, no_env).unwrap_err();
        assert!(err.to_string().contains("full_refresh_interval_hours"));

        let file_config = FileConfig {
            pipeline: Some(PipelineConfig {
                recent_window_hours: Some(u64::MAX),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err =
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file_config), no_env)
                .unwrap_err();
        assert!(err.to_string().contains("recent_window_hours"));

        let file_config = FileConfig {
            scheduler: Some(SchedulerConfig {
                quick_interval_hours: Some(MAX_HOURS),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config =
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file_config), no_env)
                .unwrap();
        assert_eq!(config.scheduler.quick_interval, hours(MAX_HOURS));
    }

    #[test]
    fn test_rejects_negative_weights() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            relevance: Some(RelevanceConfig {
                per_source: Some(-5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file_config), no_env)
                .is_err()
        );
    }

    #[test]
    fn test_classify_new_records_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            classifier: Some(ClassifierConfig {
                classify_new_records: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config =
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file_config), no_env)
                .unwrap();
        assert!(config.classifier.classify_new_records);
        assert_eq!(config.classifier.backfill_limit, 100);
    }

    #[test]
    fn test_rejects_zero_retries() {
        let temp_dir = TempDir::new().unwrap();
        let file_config = FileConfig {
            classifier: Some(ClassifierConfig {
                max_retries: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file_config), no_env)
                .is_err()
        );
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve_with_env(&CliConfig::default(), None, no_env);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve_with_env(&cli, None, no_env);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }
}
