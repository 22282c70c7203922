//! Lucid news server library.
//!
//! Exposes the pipeline, storage, ranking and classification modules for the
//! binary, the integration tests and embedders that bring their own
//! ingestor and grouper.

pub mod background_jobs;
pub mod classifier;
pub mod cli_style;
pub mod config;
pub mod llm;
pub mod news_store;
pub mod pipeline;
pub mod ranking;
pub mod server;
pub mod sqlite_persistence;

pub use news_store::{NewsStore, SqliteNewsStore};
pub use pipeline::{Collaborators, PipelineCoordinator};
pub use server::{run_server, RequestsLoggingLevel};
