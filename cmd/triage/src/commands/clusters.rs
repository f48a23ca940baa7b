//! Cluster listing and inspection.

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use triage_cluster::{ClusterRecord, FeedbackItem, FeedbackStore};

use super::{Project, output_result};
use crate::Cli;

/// List clusters, largest first.
#[derive(Args)]
pub struct ClustersCommand {
    /// Show at most this many clusters
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ClusterRow {
    id: String,
    title: String,
    status: String,
    members: usize,
    updated_at: DateTime<Utc>,
}

impl ClustersCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::open(cli)?;
        let mut rows: Vec<ClusterRow> = project
            .persistence()
            .load_clusters()
            .await?
            .into_iter()
            .map(|c| ClusterRow {
                members: c.members.len(),
                id: c.record.id,
                title: c.record.title,
                status: c.record.status,
                updated_at: c.record.updated_at,
            })
            .collect();
        rows.sort_by(|a, b| b.members.cmp(&a.members).then_with(|| a.id.cmp(&b.id)));
        if let Some(n) = self.limit {
            rows.truncate(n);
        }
        output_result(cli, &rows)
    }
}

/// Show one cluster with its summary and member items.
#[derive(Args)]
pub struct ShowCommand {
    /// Cluster id
    id: String,
}

#[derive(Serialize)]
struct ClusterDetail {
    #[serde(flatten)]
    cluster: ClusterRecord,
    members: Vec<FeedbackItem>,
}

impl ShowCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::open(cli)?;
        let persistence = project.persistence();

        let Some(cluster) = persistence.get_clusters(&[self.id.as_str()]).await?.pop().flatten() else {
            anyhow::bail!("cluster '{}' not found", self.id);
        };
        let ids = persistence
            .get_cluster_member_ids(&[self.id.as_str()])
            .await?
            .pop()
            .unwrap_or_default();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let members = project
            .feedback()
            .get_items(&refs)
            .await?
            .into_iter()
            .flatten()
            .collect();

        output_result(cli, &ClusterDetail { cluster, members })
    }
}
