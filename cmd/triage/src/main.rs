//! Triage CLI - cluster incoming feedback into actionable issues.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ClustersCommand, ConfigCommand, IngestCommand, JobsCommand, ResetCommand, RunCommand,
    ShowCommand,
};

/// Triage CLI - cluster incoming feedback into actionable issues.
///
/// Feedback is ingested into a local database, embedded, and grouped with
/// similar reports. Each cluster carries a generated summary and draft issue.
///
/// Configuration is stored in ~/.triage/triage/ and supports multiple contexts,
/// similar to kubectl's context management.
#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Feedback clustering CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.triage/triage/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Context name to use
    #[arg(short = 'c', long, global = true)]
    pub context: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Add feedback items from a YAML or JSON file
    Ingest(IngestCommand),
    /// Cluster everything on the backlog
    Run(RunCommand),
    /// List past clustering runs
    Jobs(JobsCommand),
    /// List clusters
    Clusters(ClustersCommand),
    /// Show one cluster with its members
    Show(ShowCommand),
    /// Delete all clusters and requeue their members
    Reset(ResetCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Ingest(cmd) => cmd.run(&cli).await,
        Commands::Run(cmd) => cmd.run(&cli).await,
        Commands::Jobs(cmd) => cmd.run(&cli).await,
        Commands::Clusters(cmd) => cmd.run(&cli).await,
        Commands::Show(cmd) => cmd.run(&cli).await,
        Commands::Reset(cmd) => cmd.run(&cli).await,
    }
}
