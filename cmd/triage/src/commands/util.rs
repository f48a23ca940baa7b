//! Utility functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use triage_cli::{Config, Context, EmbedProvider, Output, OutputFormat, Paths, SummarizerProvider};
use triage_cluster::{
    ClusterEngine, ClusterPersistence, EmbeddingCache, JobLog, KVFeedbackStore, Runner,
    RunnerConfig,
};
use triage_embed::{EmbedConfig, Embedder, Gemini, OpenAI};
use triage_kv::{KVStore, RedbStore};
use triage_summarize::{FirstItem, OpenAIChat, Summarizer};

use crate::Cli;

const APP_NAME: &str = "triage";

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    triage_cli::load_config(APP_NAME, cli.config.as_deref())
}

/// Gets the context to use, with environment overrides applied.
pub fn get_context(cli: &Cli) -> anyhow::Result<Context> {
    let cfg = get_config(cli)?;

    let mut ctx = match cfg.resolve_context(cli.context.as_deref()) {
        Some(ctx) => ctx.clone(),
        None => match cli.context.as_deref() {
            Some(name) => anyhow::bail!("context '{}' not found", name),
            None => anyhow::bail!(
                "no context specified. Use -c flag or set a default context with 'triage config use'"
            ),
        },
    };
    ctx.apply_env(|k| std::env::var(k).ok());
    Ok(ctx)
}

/// Everything a command needs to talk to one project's database.
pub struct Project {
    pub ctx: Context,
    pub store: Arc<dyn KVStore>,
}

impl Project {
    pub fn open(cli: &Cli) -> anyhow::Result<Self> {
        let ctx = get_context(cli)?;
        let path = Paths::new(APP_NAME)?.db_path(&ctx.kv_path, &ctx.name)?;
        debug!(path = %path.display(), ns = ctx.namespace_or_default(), "opening database");
        let store: Arc<dyn KVStore> = Arc::new(RedbStore::open(&path)?);
        Ok(Self { ctx, store })
    }

    pub fn ns(&self) -> &str {
        self.ctx.namespace_or_default()
    }

    pub fn feedback(&self) -> KVFeedbackStore {
        KVFeedbackStore::new(self.store.clone(), self.ns())
    }

    pub fn persistence(&self) -> ClusterPersistence {
        ClusterPersistence::new(self.store.clone(), self.ns())
    }

    pub fn cache(&self) -> EmbeddingCache {
        EmbeddingCache::new(self.store.clone(), self.ns())
    }

    pub fn jobs(&self) -> JobLog {
        JobLog::new(self.store.clone(), self.ns())
    }

    /// Build a runner from the context's provider settings. Runs are
    /// recorded in the project's job log.
    pub fn runner(&self, force_summary: bool) -> anyhow::Result<Runner> {
        self.ctx.validate()?;
        let engine = ClusterEngine::new(self.cache(), create_embedder(&self.ctx))
            .with_body_chars(self.ctx.body_chars_or_default());
        Ok(Runner::new(
            Arc::new(self.feedback()),
            engine,
            self.persistence(),
            create_summarizer(&self.ctx),
            RunnerConfig {
                threshold: self.ctx.threshold_or_default(),
                force_summary,
                ..Default::default()
            },
        )
        .with_job_log(self.jobs()))
    }
}

/// Creates the embedding provider selected by the context.
pub fn create_embedder(ctx: &Context) -> Arc<dyn Embedder> {
    let e = &ctx.embed;
    let mut cfg = EmbedConfig::default().with_dimension(e.dimension);
    if !e.model.is_empty() {
        cfg = cfg.with_model(&e.model);
    }
    if !e.base_url.is_empty() {
        cfg = cfg.with_base_url(&e.base_url);
    }
    match e.provider {
        EmbedProvider::OpenAI => Arc::new(OpenAI::with_config(&e.api_key, cfg)),
        EmbedProvider::Gemini => Arc::new(Gemini::with_config(&e.api_key, cfg)),
    }
}

/// Creates the summarizer selected by the context.
pub fn create_summarizer(ctx: &Context) -> Arc<dyn Summarizer> {
    let s = &ctx.summarizer;
    match s.provider {
        SummarizerProvider::FirstItem => Arc::new(FirstItem),
        SummarizerProvider::OpenAI => Arc::new(
            OpenAIChat::new(&s.api_key)
                .with_model(&s.model)
                .with_base_url(&s.base_url)
                .with_body_chars(ctx.body_chars_or_default()),
        ),
    }
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("yaml");

    let result = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    Ok(result)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: Serialize>(cli: &Cli, result: &T) -> anyhow::Result<()> {
    Output::new(OutputFormat::from_json_flag(cli.json), cli.output.clone()).write(result)
}
