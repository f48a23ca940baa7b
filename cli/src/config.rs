//! Configuration management for the triage CLI.
//!
//! Configuration is stored in ~/.triage/{app_name}/config.yaml and holds named
//! contexts, one per project or environment, kubectl style.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths::{DEFAULT_BASE_DIR, DEFAULT_CONFIG_FILE};

/// Default similarity threshold for joining a cluster.
pub const DEFAULT_THRESHOLD: f32 = 0.72;
/// Default number of body characters used per item.
pub const DEFAULT_BODY_CHARS: usize = 1500;
/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Environment variable overriding the embedding API key.
pub const ENV_EMBED_API_KEY: &str = "TRIAGE_EMBED_API_KEY";
/// Environment variable overriding the summarizer API key.
pub const ENV_SUMMARY_API_KEY: &str = "TRIAGE_SUMMARY_API_KEY";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application name (not serialized).
    #[serde(skip)]
    pub app_name: String,

    /// Name of the currently active context.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,

    /// Map of context name to context configuration.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub contexts: HashMap<String, Context>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// Settings for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Path of the redb database file. Empty uses the app data directory.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kv_path: String,

    /// Key namespace inside the database.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Similarity threshold; unset uses [`DEFAULT_THRESHOLD`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    /// Body characters per item; unset uses [`DEFAULT_BODY_CHARS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_chars: Option<usize>,

    #[serde(default)]
    pub embed: EmbedSettings,

    #[serde(default)]
    pub summarizer: SummarizerSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedProvider {
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummarizerProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[default]
    FirstItem,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedSettings {
    #[serde(default)]
    pub provider: EmbedProvider,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// Output dimension; 0 uses the provider default.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dimension: usize,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,
}

/// Summarizer settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizerSettings {
    #[serde(default)]
    pub provider: SummarizerProvider,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Config {
    /// Gets the default config directory.
    pub fn default_config_dir(app_name: &str) -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(app_name))
    }

    /// Gets the default config file path.
    pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
        Self::default_config_dir(app_name).map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Adds or replaces a context. The first context added becomes current.
    pub fn add_context(&mut self, name: &str, mut ctx: Context) -> anyhow::Result<()> {
        ctx.name = name.to_string();
        self.contexts.insert(name.to_string(), ctx);
        if self.current_context.is_empty() {
            self.current_context = name.to_string();
        }
        self.save()
    }

    /// Deletes a context.
    pub fn delete_context(&mut self, name: &str) -> anyhow::Result<()> {
        if self.contexts.remove(name).is_none() {
            anyhow::bail!("context '{}' not found", name);
        }
        if self.current_context == name {
            self.current_context.clear();
        }
        self.save()
    }

    /// Sets the current context.
    pub fn use_context(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.contexts.contains_key(name) {
            anyhow::bail!("context '{}' not found", name);
        }
        self.current_context = name.to_string();
        self.save()
    }

    /// Gets the current context.
    pub fn get_current_context(&self) -> Option<&Context> {
        if self.current_context.is_empty() {
            return None;
        }
        self.contexts.get(&self.current_context)
    }

    /// Resolves the context by name, or current context if name is empty.
    pub fn resolve_context(&self, name: Option<&str>) -> Option<&Context> {
        match name {
            Some(n) if !n.is_empty() => self.contexts.get(n),
            _ => self.get_current_context(),
        }
    }

    /// Lists all context names, sorted.
    pub fn list_contexts(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.contexts.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Context {
    pub fn namespace_or_default(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    pub fn threshold_or_default(&self) -> f32 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn body_chars_or_default(&self) -> usize {
        self.body_chars.unwrap_or(DEFAULT_BODY_CHARS)
    }

    /// Fill API keys from the environment, via `lookup`.
    ///
    /// Environment values win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_EMBED_API_KEY).filter(|k| !k.is_empty()) {
            self.embed.api_key = key;
        }
        if let Some(key) = lookup(ENV_SUMMARY_API_KEY).filter(|k| !k.is_empty()) {
            self.summarizer.api_key = key;
        }
    }

    /// Check that every selected provider has what it needs.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(t) = self.threshold
            && !(0.0..=1.0).contains(&t)
        {
            anyhow::bail!("threshold {} out of range [0, 1]", t);
        }
        if self.embed.api_key.is_empty() {
            anyhow::bail!("embed api key is not set (config or {})", ENV_EMBED_API_KEY);
        }
        if self.summarizer.provider == SummarizerProvider::OpenAI && self.summarizer.api_key.is_empty() {
            anyhow::bail!("summarizer api key is not set (config or {})", ENV_SUMMARY_API_KEY);
        }
        Ok(())
    }
}

/// Loads configuration for the specified app, creating an empty file if none
/// exists yet.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => Config::default_config_path(app_name)
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&content)?
    } else {
        let cfg = Config::default();
        std::fs::write(&config_path, serde_yaml::to_string(&cfg)?)?;
        cfg
    };

    cfg.app_name = app_name.to_string();
    cfg.config_path = config_path;
    Ok(cfg)
}

/// Masks the API key for display.
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        "*".repeat(key.len())
    } else {
        format!(
            "{}{}{}",
            &key[..4],
            "*".repeat(key.len() - 8),
            &key[key.len() - 4..]
        )
    }
}
