//! Clustering run history.

use clap::Args;

use super::{Project, output_result};
use crate::Cli;

/// List recorded clustering runs, newest first.
///
/// A job still marked running was interrupted before it finished.
#[derive(Args)]
pub struct JobsCommand {
    /// Show at most this many jobs
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

impl JobsCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::open(cli)?;
        let jobs = project.jobs().list(Some(self.limit)).await?;
        output_result(cli, &jobs)
    }
}
