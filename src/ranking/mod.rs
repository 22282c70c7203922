//! Read-time ordering of records.

mod relevance;

pub use relevance::{RankedRecord, RelevanceRanker, RelevanceWeights};
