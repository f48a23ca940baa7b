use serde::{Deserialize, Serialize};

use crate::error::SummarizeError;

/// One feedback item handed to a summarizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub title: String,
    pub body: String,
    pub source: String,
}

/// Human-readable description of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub summary: String,
    pub issue_title: String,
    pub issue_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// Summarizer produces a [`Summary`] for the items of one cluster.
///
/// Implementations must be safe for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, items: &[SummaryItem]) -> Result<Summary, SummarizeError>;
}
