//! OpenAI-compatible `/embeddings` client.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::embed::Embedder;
use crate::error::{EmbedError, decode_json};

pub const MODEL_OPENAI_3_SMALL: &str = "text-embedding-3-small";
pub const MODEL_OPENAI_3_LARGE: &str = "text-embedding-3-large";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MAX_BATCH: usize = 2048;
const OPENAI_DEFAULT_DIM: usize = 1536;

/// Embedder for OpenAI and any server speaking its embeddings API.
///
/// The `dimensions` request field is only sent to `text-embedding-3*`
/// models; other models answer at their native size.
pub struct OpenAI {
    client: Client,
    api_key: String,
    model: String,
    dim: usize,
    base_url: String,
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct Response {
    data: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAI {
    pub fn new(api_key: &str) -> Self {
        Self::with_config(api_key, EmbedConfig::default())
    }

    pub fn with_config(api_key: &str, cfg: EmbedConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: cfg.model_or(MODEL_OPENAI_3_SMALL),
            dim: cfg.dimension_or(OPENAI_DEFAULT_DIM),
            base_url: cfg.base_url_or(OPENAI_BASE_URL),
        }
    }

    fn request<'a>(&'a self, texts: &'a [&'a str]) -> Request<'a> {
        Request {
            model: &self.model,
            input: texts,
            dimensions: self.model.starts_with("text-embedding-3").then_some(self.dim),
            encoding_format: "float",
        }
    }

    async fn call_api(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request(texts))
            .send()
            .await?;
        let data: Response = decode_json(resp).await?;
        order_by_index(data, texts.len())
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAI {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(OPENAI_MAX_BATCH) {
            debug!(model = %self.model, n = chunk.len(), "embed: openai request");
            out.extend(self.call_api(chunk).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Slot each embedding by its `index`; responses may come back out of order.
fn order_by_index(resp: Response, batch_size: usize) -> Result<Vec<Vec<f32>>, EmbedError> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; batch_size];
    for item in resp.data {
        let slot = slots.get_mut(item.index).ok_or(EmbedError::UnexpectedIndex {
            index: item.index,
            batch_size,
        })?;
        *slot = Some(item.embedding);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or(EmbedError::MissingIndex(i)))
        .collect()
}
