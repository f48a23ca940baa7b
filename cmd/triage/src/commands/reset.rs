//! Cluster reset.

use clap::Args;
use serde::Serialize;

use super::{Project, output_result};
use crate::Cli;

/// Delete every cluster and put its members back on the backlog.
#[derive(Args)]
pub struct ResetCommand {
    /// Also drop cached embeddings of every ingested item
    #[arg(long)]
    embeddings: bool,
}

#[derive(Serialize)]
struct ResetResult {
    clusters_removed: usize,
    embeddings_invalidated: usize,
}

impl ResetCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::open(cli)?;

        let mut embeddings_invalidated = 0;
        if self.embeddings {
            let ids = project.feedback().list_all_ids().await?;
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            project.cache().invalidate(&refs).await?;
            embeddings_invalidated = ids.len();
        }
        let clusters_removed = project.persistence().reset().await?;

        output_result(
            cli,
            &ResetResult {
                clusters_removed,
                embeddings_invalidated,
            },
        )
    }
}
