use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SummarizeError;
use crate::prompt::{DEFAULT_BODY_CHARS, build_items_text, build_system_prompt};
use crate::summarize::{Summarizer, Summary, SummaryItem};

pub const MODEL_GPT_4O_MINI: &str = "gpt-4o-mini";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Summarizer backed by an OpenAI-compatible `/chat/completions` endpoint
/// in JSON-object response mode.
pub struct OpenAIChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    body_chars: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIChat {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: MODEL_GPT_4O_MINI.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            body_chars: DEFAULT_BODY_CHARS,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        if !model.is_empty() {
            self.model = model.to_string();
        }
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        if !url.is_empty() {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_body_chars(mut self, n: usize) -> Self {
        if n > 0 {
            self.body_chars = n;
        }
        self
    }
}

#[async_trait::async_trait]
impl Summarizer for OpenAIChat {
    async fn summarize(&self, items: &[SummaryItem]) -> Result<Summary, SummarizeError> {
        if items.is_empty() {
            return Err(SummarizeError::EmptyInput);
        }

        let user = build_items_text(items, self.body_chars);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: build_system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.2,
        };

        debug!(model = %self.model, items = items.len(), "summarize: chat request");
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SummarizeError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Api(format!("HTTP {status}: {body}")));
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SummarizeError::Api(e.to_string()))?;
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SummarizeError::InvalidResponse("no choices".into()))?;
        parse_summary(&content)
    }
}

/// Parse the model's JSON reply. Title, summary and issue fields are required.
pub(crate) fn parse_summary(content: &str) -> Result<Summary, SummarizeError> {
    let s: Summary = serde_json::from_str(content.trim())
        .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?;
    if s.title.trim().is_empty() {
        return Err(SummarizeError::InvalidResponse("empty title".into()));
    }
    let repo_url = s.repo_url.filter(|u| !u.trim().is_empty());
    Ok(Summary { repo_url, ..s })
}
