//! CLI commands module.

mod clusters;
mod config;
mod ingest;
mod jobs;
mod reset;
mod run;
mod util;

pub use clusters::{ClustersCommand, ShowCommand};
pub use config::ConfigCommand;
pub use ingest::IngestCommand;
pub use jobs::JobsCommand;
pub use reset::ResetCommand;
pub use run::RunCommand;

pub(crate) use util::*;
