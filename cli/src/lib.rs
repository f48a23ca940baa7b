//! CLI utilities for triage.
//!
//! Context-based YAML configuration, directory layout and output rendering
//! shared by the `triage` binary.

pub mod config;
pub mod output;
pub mod paths;

pub use config::{
    Config, Context, EmbedProvider, EmbedSettings, SummarizerProvider, SummarizerSettings,
    load_config, mask_api_key,
};
pub use output::{Output, OutputFormat, print_success};
pub use paths::Paths;
