//! Jobs driving the refresh pipeline.

pub mod pipeline_jobs;

pub use pipeline_jobs::{pipeline_jobs, PipelineJob};
