//! Configuration management commands.

use clap::{Args, Subcommand, ValueEnum};
use triage_cli::config::{mask_api_key, Context as CliContext, EmbedSettings, SummarizerSettings};
use triage_cli::{EmbedProvider, SummarizerProvider, print_success};

use super::get_config;
use crate::Cli;

/// Manage CLI configuration.
///
/// Contexts allow you to manage multiple projects or databases,
/// similar to kubectl's context management.
///
/// Configuration is stored in ~/.triage/triage/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedArg {
    Openai,
    Gemini,
}

#[derive(Clone, Copy, ValueEnum)]
enum SummarizerArg {
    Openai,
    FirstItem,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a context
    Add {
        /// Context name
        name: String,
        /// Database file (default: ~/.triage/triage/data/<name>.redb)
        #[arg(long)]
        kv_path: Option<String>,
        /// Key namespace
        #[arg(long)]
        namespace: Option<String>,
        /// Similarity threshold for joining a cluster
        #[arg(long)]
        threshold: Option<f32>,
        /// Body characters used per item
        #[arg(long)]
        body_chars: Option<usize>,
        /// Embedding provider
        #[arg(long, value_enum, default_value = "openai")]
        embed: EmbedArg,
        /// Embedding API key
        #[arg(long)]
        embed_api_key: Option<String>,
        /// Embedding model
        #[arg(long)]
        embed_model: Option<String>,
        /// Embedding dimension
        #[arg(long)]
        embed_dimension: Option<usize>,
        /// Embedding API base URL
        #[arg(long)]
        embed_base_url: Option<String>,
        /// Summarizer
        #[arg(long, value_enum, default_value = "first-item")]
        summarizer: SummarizerArg,
        /// Summarizer API key
        #[arg(long)]
        summary_api_key: Option<String>,
        /// Summarizer model
        #[arg(long)]
        summary_model: Option<String>,
        /// Summarizer API base URL
        #[arg(long)]
        summary_base_url: Option<String>,
    },
    /// Delete a context
    Delete {
        /// Context name
        name: String,
    },
    /// Set the current context
    Use {
        /// Context name
        name: String,
    },
    /// View the current configuration
    Show,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Add {
                name,
                kv_path,
                namespace,
                threshold,
                body_chars,
                embed,
                embed_api_key,
                embed_model,
                embed_dimension,
                embed_base_url,
                summarizer,
                summary_api_key,
                summary_model,
                summary_base_url,
            } => {
                let mut cfg = get_config(cli)?;
                let ctx = CliContext {
                    kv_path: kv_path.clone().unwrap_or_default(),
                    namespace: namespace.clone().unwrap_or_default(),
                    threshold: *threshold,
                    body_chars: *body_chars,
                    embed: EmbedSettings {
                        provider: match embed {
                            EmbedArg::Openai => EmbedProvider::OpenAI,
                            EmbedArg::Gemini => EmbedProvider::Gemini,
                        },
                        api_key: embed_api_key.clone().unwrap_or_default(),
                        model: embed_model.clone().unwrap_or_default(),
                        dimension: embed_dimension.unwrap_or(0),
                        base_url: embed_base_url.clone().unwrap_or_default(),
                    },
                    summarizer: SummarizerSettings {
                        provider: match summarizer {
                            SummarizerArg::Openai => SummarizerProvider::OpenAI,
                            SummarizerArg::FirstItem => SummarizerProvider::FirstItem,
                        },
                        api_key: summary_api_key.clone().unwrap_or_default(),
                        model: summary_model.clone().unwrap_or_default(),
                        base_url: summary_base_url.clone().unwrap_or_default(),
                    },
                    ..Default::default()
                };
                if let Some(t) = threshold
                    && !(0.0..=1.0).contains(t)
                {
                    anyhow::bail!("threshold {} out of range [0, 1]", t);
                }

                cfg.add_context(name, ctx)?;
                print_success(&format!("Context \"{}\" added successfully", name));
                Ok(())
            }

            ConfigSubcommand::Delete { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_context(name)?;
                print_success(&format!("Context \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::Use { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_context(name)?;
                print_success(&format!("Switched to context \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::Show => {
                let cfg = get_config(cli)?;

                println!("Config file: {}", cfg.path().display());
                println!("Current context: {}", cfg.current_context);

                for name in cfg.list_contexts() {
                    let Some(ctx) = cfg.contexts.get(name) else {
                        continue;
                    };
                    let current = if name == cfg.current_context { " (current)" } else { "" };
                    println!("\n  {}{}:", name, current);
                    println!("    Namespace: {}", ctx.namespace_or_default());
                    if !ctx.kv_path.is_empty() {
                        println!("    Database: {}", ctx.kv_path);
                    }
                    println!("    Threshold: {}", ctx.threshold_or_default());
                    println!("    Body chars: {}", ctx.body_chars_or_default());
                    println!(
                        "    Embed: {:?} {} key={}",
                        ctx.embed.provider,
                        ctx.embed.model,
                        mask_api_key(&ctx.embed.api_key)
                    );
                    println!(
                        "    Summarizer: {:?} {} key={}",
                        ctx.summarizer.provider,
                        ctx.summarizer.model,
                        mask_api_key(&ctx.summarizer.api_key)
                    );
                }

                Ok(())
            }
        }
    }
}
