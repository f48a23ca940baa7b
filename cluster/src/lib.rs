//! Incremental feedback clustering.
//!
//! Feedback items are embedded (through a read-through [`EmbeddingCache`]),
//! assigned to the nearest cluster centroid above a similarity threshold, and
//! the touched clusters are committed by [`ClusterPersistence`] in one
//! pipelined round trip. [`Runner`] drives one pass over the unclustered
//! backlog, optionally recorded in a [`JobLog`].

pub mod cache;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod keys;
pub mod persist;
pub mod runner;
pub mod store;
pub mod summary;
pub mod types;

pub use cache::EmbeddingCache;
pub use engine::{Assigner, ClusterEngine, DEFAULT_BODY_CHARS, DEFAULT_THRESHOLD};
pub use error::ClusterError;
pub use jobs::{JobLog, JobRecord, JobStatus};
pub use persist::{ClusterPersistence, StoredCluster};
pub use runner::{DEFAULT_MAX_SUMMARY_ITEMS, RunStats, Runner, RunnerConfig};
pub use store::{FeedbackStore, KVFeedbackStore};
pub use summary::{SummaryOptions, SummaryOutcome, generate_cluster_summary, should_regenerate};
pub use types::{
    Assignment, BatchOutcome, ClusterData, ClusterDelta, ClusterRecord, ClusterUpdate, Decision,
    FeedbackItem, Source, prepare_text,
};

pub use triage_summarize::Summary;

#[cfg(test)]
mod tests;
