use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Ingests only when too few recent items exist.
    Smart,
    /// Always ingests.
    Forced,
    /// Never ingests, only processes ungrouped items.
    Quick,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Smart => "smart",
            RunMode::Forced => "forced",
            RunMode::Quick => "quick",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub mode: RunMode,
    pub status: RunStatus,
    /// Items counted in the recent window; `None` for quick runs.
    pub recent_count: Option<usize>,
    pub ingest_attempted: bool,
    pub ingested: usize,
    /// Set when ingestion failed; the run still continues.
    pub ingest_error: Option<String>,
    pub groups_found: usize,
    pub records_created: usize,
    pub enrich_failures: usize,
    pub error: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl RunResult {
    pub(crate) fn new(mode: RunMode) -> Self {
        Self {
            mode,
            status: RunStatus::Completed,
            recent_count: None,
            ingest_attempted: false,
            ingested: 0,
            ingest_error: None,
            groups_found: 0,
            records_created: 0,
            enrich_failures: 0,
            error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_for_api() {
        let mut result = RunResult::new(RunMode::Forced);
        result.records_created = 2;
        result.duration = Duration::from_millis(1500);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mode"], "forced");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["records_created"], 2);
        assert_eq!(json["duration_ms"], 1500);
        assert!(json["recent_count"].is_null());
    }
}
