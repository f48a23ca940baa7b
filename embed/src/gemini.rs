use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedConfig;
use crate::embed::Embedder;
use crate::error::{EmbedError, decode_json};

/// Gemini embedding model.
pub const MODEL_GEMINI_EMBEDDING_001: &str = "gemini-embedding-001";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MAX_BATCH: usize = 100;
const GEMINI_DEFAULT_DIM: usize = 768;

/// Gemini embedder using the `batchEmbedContents` API.
///
/// Vectors are L2-normalized before being returned, since Gemini only
/// normalizes its full-size output.
pub struct Gemini {
    client: Client,
    api_key: String,
    model: String,
    dim: usize,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Deserialize)]
struct Values {
    values: Vec<f32>,
}

impl Gemini {
    pub fn new(api_key: &str) -> Self {
        Self::with_config(api_key, EmbedConfig::default())
    }

    pub fn with_config(api_key: &str, cfg: EmbedConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: cfg.model_or(MODEL_GEMINI_EMBEDDING_001),
            dim: cfg.dimension_or(GEMINI_DEFAULT_DIM),
            base_url: cfg.base_url_or(GEMINI_BASE_URL),
        }
    }

    async fn call_api(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let model_path = format!("models/{}", self.model);
        let url = format!("{}/{}:batchEmbedContents", self.base_url, model_path);
        let body = BatchRequest {
            requests: texts
                .iter()
                .map(|t| EmbedRequest {
                    model: &model_path,
                    content: Content {
                        parts: [Part { text: t }],
                    },
                    output_dimensionality: self.dim,
                })
                .collect(),
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let data: BatchResponse = decode_json(resp).await?;
        if data.embeddings.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                got: data.embeddings.len(),
                want: texts.len(),
            });
        }
        Ok(data
            .embeddings
            .into_iter()
            .map(|e| triage_vecmath::normalize_embedding(&e.values))
            .collect())
    }
}

#[async_trait::async_trait]
impl Embedder for Gemini {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut result = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(GEMINI_MAX_BATCH) {
            debug!(model = %self.model, n = chunk.len(), "embed: gemini request");
            result.extend(self.call_api(chunk).await?);
        }
        Ok(result)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
