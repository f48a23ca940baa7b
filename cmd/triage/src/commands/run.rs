//! Clustering run.

use clap::Args;

use super::{Project, output_result};
use crate::Cli;

/// Cluster every item on the backlog.
///
/// New items are embedded (cached embeddings are reused), assigned to the
/// most similar cluster or a new one, and summaries are regenerated for new
/// clusters and clusters that grew by more than half. Each run is recorded;
/// see `triage jobs`.
#[derive(Args)]
pub struct RunCommand {
    /// Regenerate the summary of every touched cluster
    #[arg(long)]
    force_summary: bool,
}

impl RunCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::open(cli)?;
        let stats = project.runner(self.force_summary)?.run().await?;
        output_result(cli, &stats)
    }
}
