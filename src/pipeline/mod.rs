//! Refresh pipeline: ingest, group and enrich, with a skip heuristic for
//! redundant ingestion.

mod collaborators;
mod coordinator;
mod run_result;

pub use collaborators::{
    Collaborators, Enricher, ExtractiveEnricher, Grouper, Ingestor, NullGrouper, NullIngestor,
};
pub use coordinator::{should_ingest, PipelineCoordinator, PipelineError, PipelineStage};
pub use run_result::{RunMode, RunResult, RunStatus};
