use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lucid_server::background_jobs::PipelineScheduler;
use lucid_server::classifier::{CategoryBackfill, CategoryClassifier, ClassifyingEnricher};
use lucid_server::cli_style::{self, get_styles, TableBuilder};
use lucid_server::config::{self, AppConfig};
use lucid_server::llm::build_provider;
use lucid_server::news_store::{NewsStore, SqliteNewsStore};
use lucid_server::pipeline::{Collaborators, PipelineCoordinator, RunResult};
use lucid_server::ranking::RelevanceRanker;
use lucid_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), version, about = "Multi-source news aggregation server")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the news database.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, global = true, default_value_t = 5000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, global = true, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, global = true, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long, global = true)]
    pub frontend_dir_path: Option<String>,

    /// Run the pipeline on timers. Also enabled by ENABLE_SCHEDULER=true.
    #[clap(long, global = true)]
    pub enable_scheduler: bool,

    /// Hours between forced full refreshes.
    #[clap(long, global = true)]
    pub full_refresh_interval_hours: Option<u64>,

    /// Text-generation provider: ollama, groq or together.
    #[clap(long, global = true)]
    pub llm_provider: Option<String>,

    /// Model name passed to the provider.
    #[clap(long, global = true)]
    pub llm_model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,

    /// Run the refresh pipeline once.
    Pipeline {
        /// Ingest even when plenty of recent items exist.
        #[clap(long)]
        force: bool,
    },

    /// Group and enrich pending items without ingesting.
    Quick,

    /// Print store statistics.
    Stats,

    /// Classify records that have no category yet.
    BackfillCategories {
        /// Maximum number of records to classify.
        #[clap(long)]
        limit: Option<usize>,

        /// Classify and report without writing.
        #[clap(long)]
        dry_run: bool,
    },
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            enable_scheduler: args.enable_scheduler,
            full_refresh_interval_hours: args.full_refresh_interval_hours,
            llm_provider: args.llm_provider.clone(),
            llm_model: args.llm_model.clone(),
        }
    }
}

fn open_coordinator(app_config: &AppConfig) -> Result<Arc<PipelineCoordinator>> {
    let db_path = app_config.news_db_path();
    if !db_path.exists() {
        info!("Creating new news database at {:?}", db_path);
    }
    let store = Arc::new(SqliteNewsStore::new(&db_path)?);
    Ok(Arc::new(PipelineCoordinator::new(
        store,
        collaborators(app_config),
        app_config.pipeline.clone(),
    )))
}

/// Default collaborators, with new records classified on the fly when
/// `[classifier] classify_new_records` is set and a provider can be built.
fn collaborators(app_config: &AppConfig) -> Collaborators {
    let mut collaborators = Collaborators::default();
    if !app_config.classifier.classify_new_records {
        return collaborators;
    }
    match build_provider(&app_config.llm) {
        Ok(provider) => {
            info!("New records are classified with {}", provider.name());
            let classifier = CategoryClassifier::new(
                provider,
                &app_config.classifier,
                app_config.llm.completion_options(),
            );
            collaborators.enricher = Arc::new(ClassifyingEnricher::new(
                collaborators.enricher.clone(),
                Arc::new(classifier),
                tokio::runtime::Handle::current(),
            ));
        }
        Err(e) => warn!("Classification of new records disabled: {}", e),
    }
    collaborators
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  scheduler enabled: {}", app_config.scheduler.enabled);
    info!("  llm provider: {}", app_config.llm.provider);

    let coordinator = open_coordinator(&app_config)?;

    match cli_args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(app_config, coordinator).await,
        Command::Pipeline { force } => {
            let run = tokio::task::spawn_blocking({
                let coordinator = coordinator.clone();
                move || coordinator.run_pipeline(force)
            })
            .await?;
            print_run(&run, coordinator.store().as_ref())
        }
        Command::Quick => {
            let run = tokio::task::spawn_blocking({
                let coordinator = coordinator.clone();
                move || coordinator.run_quick()
            })
            .await?;
            print_run(&run, coordinator.store().as_ref())
        }
        Command::Stats => print_stats(coordinator.store().as_ref()),
        Command::BackfillCategories { limit, dry_run } => {
            backfill(&app_config, coordinator, limit, dry_run).await
        }
    }
}

async fn serve(app_config: AppConfig, coordinator: Arc<PipelineCoordinator>) -> Result<()> {
    info!("Initializing metrics...");
    metrics::init_metrics();
    if let Ok(stats) = coordinator.store().get_stats() {
        metrics::set_store_counts(stats.total_items, stats.total_records);
    }

    let scheduler = PipelineScheduler::new(coordinator.clone());
    let scheduler_handle = scheduler.start(&app_config.scheduler).await;

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
    };
    let state = ServerState::new(
        server_config,
        coordinator,
        RelevanceRanker::new(app_config.relevance),
        app_config.listing.clone(),
        scheduler_handle,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };
    let result = run_server(state, shutdown).await;
    scheduler.stop().await;
    result
}

fn print_run(run: &RunResult, store: &dyn NewsStore) -> Result<()> {
    let stats = store.get_stats()?;

    cli_style::print_section_header(&format!("{} run", run.mode));
    if let Some(recent) = run.recent_count {
        cli_style::print_key_value("recent items", &recent.to_string());
    }
    if run.ingest_attempted {
        cli_style::print_key_value("ingested", &run.ingested.to_string());
    }
    if let Some(e) = &run.ingest_error {
        cli_style::print_warning(&format!("ingestion failed: {}", e));
    }
    cli_style::print_key_value("groups", &run.groups_found.to_string());
    cli_style::print_key_value_highlight("stories created", &run.records_created.to_string());
    if run.enrich_failures > 0 {
        cli_style::print_warning(&format!("{} groups failed to enrich", run.enrich_failures));
    }
    cli_style::print_key_value("articles", &stats.total_items.to_string());
    cli_style::print_key_value("stories", &stats.total_records.to_string());
    cli_style::print_key_value("sources", &stats.unique_sources.to_string());
    cli_style::print_key_value("elapsed", &cli_style::format_elapsed(run.duration));
    cli_style::print_section_footer();

    match &run.error {
        None => {
            cli_style::print_success("Pipeline finished");
            Ok(())
        }
        Some(e) => {
            cli_style::print_error(e);
            anyhow::bail!("pipeline run failed")
        }
    }
}

fn print_stats(store: &dyn NewsStore) -> Result<()> {
    let stats = store.get_stats()?;
    let or_never = |at: Option<chrono::DateTime<chrono::Utc>>| {
        at.map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    };

    cli_style::print_section_header("store");
    cli_style::print_key_value("articles", &stats.total_items.to_string());
    cli_style::print_key_value("stories", &stats.total_records.to_string());
    cli_style::print_key_value("sources", &stats.unique_sources.to_string());
    cli_style::print_key_value("last article", &or_never(stats.last_item_at));
    cli_style::print_key_value("last story", &or_never(stats.last_record_at));
    cli_style::print_section_footer();
    Ok(())
}

async fn backfill(
    app_config: &AppConfig,
    coordinator: Arc<PipelineCoordinator>,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    cli_style::print_banner("category backfill");

    let provider = match build_provider(&app_config.llm) {
        Ok(provider) => provider,
        Err(e) => {
            warn!("Classification disabled: {}", e);
            cli_style::print_error(&format!("Cannot classify: {}", e));
            return Err(e.into());
        }
    };
    if let Err(e) = provider.health_check().await {
        cli_style::print_warning(&format!("{} health check failed: {}", provider.name(), e));
    }

    let classifier = CategoryClassifier::new(
        provider,
        &app_config.classifier,
        app_config.llm.completion_options(),
    );
    let backfill = CategoryBackfill::new(
        coordinator.store().clone(),
        Arc::new(classifier),
        app_config.classifier.backfill_delay,
    );

    let started = Instant::now();
    let report = backfill
        .run(limit.unwrap_or(app_config.classifier.backfill_limit), dry_run)
        .await?;

    cli_style::print_section_header(if dry_run { "dry run" } else { "backfill" });
    cli_style::print_key_value("processed", &report.processed.to_string());
    cli_style::print_key_value_highlight("updated", &report.updated.to_string());
    if report.failed_updates > 0 {
        cli_style::print_warning(&format!("{} updates failed", report.failed_updates));
    }
    cli_style::print_key_value("elapsed", &cli_style::format_elapsed(started.elapsed()));
    cli_style::print_section_footer();

    let distribution = report.sorted_distribution();
    if !distribution.is_empty() {
        let max = distribution.first().map(|(_, n)| *n).unwrap_or(0);
        let mut table = TableBuilder::new(vec!["category", "records", ""]);
        for (category, count) in distribution {
            table.add_row(vec![
                category.to_string(),
                count.to_string(),
                cli_style::bar(count, max, 30),
            ]);
        }
        table.print();
    }
    cli_style::flush();
    Ok(())
}
