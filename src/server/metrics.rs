use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all Lucid metrics
const PREFIX: &str = "lucid";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Pipeline Metrics
    pub static ref PIPELINE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_runs_total"), "Pipeline runs by mode and status"),
        &["mode", "status"]
    ).expect("Failed to create pipeline_runs_total metric");

    pub static ref PIPELINE_RUN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_pipeline_run_duration_seconds"),
            "Pipeline run duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["mode"]
    ).expect("Failed to create pipeline_run_duration_seconds metric");

    pub static ref PIPELINE_RECORDS_CREATED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_pipeline_records_created_total"),
        "Records created by pipeline runs"
    ).expect("Failed to create pipeline_records_created_total metric");

    pub static ref PIPELINE_INGEST_SKIPS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_pipeline_ingest_skips_total"),
        "Smart runs that skipped ingestion because enough recent items exist"
    ).expect("Failed to create pipeline_ingest_skips_total metric");

    // Classification Metrics
    pub static ref CLASSIFICATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_classifications_total"), "Classification outcomes"),
        &["outcome"]
    ).expect("Failed to create classifications_total metric");

    pub static ref LLM_ATTEMPT_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_llm_attempt_failures_total"), "Failed provider attempts"),
        &["provider"]
    ).expect("Failed to create llm_attempt_failures_total metric");

    // Background Job Metrics
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Background job executions"),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");

    // Store Metrics
    pub static ref STORE_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_store_items_total"), "Items in the news store"),
        &["type"]
    ).expect("Failed to create store_items_total metric");

    // Process Metrics
    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (tests call this repeatedly)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_RECORDS_CREATED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_INGEST_SKIPS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CLASSIFICATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LLM_ATTEMPT_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(STORE_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn set_store_counts(items: usize, records: usize) {
    STORE_ITEMS_TOTAL
        .with_label_values(&["item"])
        .set(items as f64);
    STORE_ITEMS_TOTAL
        .with_label_values(&["record"])
        .set(records as f64);
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Collapses ids in request paths so that label cardinality stays bounded.
pub fn categorize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn record_pipeline_run(mode: &str, status: &str, duration: Duration, records_created: usize) {
    PIPELINE_RUNS_TOTAL.with_label_values(&[mode, status]).inc();
    PIPELINE_RUN_DURATION_SECONDS
        .with_label_values(&[mode])
        .observe(duration.as_secs_f64());
    PIPELINE_RECORDS_CREATED_TOTAL.inc_by(records_created as u64);
}

pub fn record_ingest_skip() {
    PIPELINE_INGEST_SKIPS_TOTAL.inc();
}

pub fn record_classification(outcome: &str) {
    CLASSIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_llm_attempt_failure(provider: &str) {
    LLM_ATTEMPT_FAILURES_TOTAL
        .with_label_values(&[provider])
        .inc();
}

pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    // kB
                    if let Some(Ok(kb)) = rest.split_whitespace().next().map(str::parse::<f64>) {
                        PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                        return;
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
