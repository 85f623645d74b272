//! Thin client for OpenAI-compatible chat and embedding endpoints.
//!
//! Covers exactly what pulsewire consumes: a system+user chat completion
//! with token usage (translation) and single/batch embeddings. Works
//! against any provider speaking the OpenAI wire format via `with_base_url`.

mod schema;

pub use schema::ChatUsage;

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use schema::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, RequestMessage};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Hard cap on any single request. A stuck provider call must never wedge
/// the scheduler; the retry boundary handles what this cuts off.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A chat completion's content plus what it cost.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: ChatUsage,
    pub model: String,
}

pub struct LlmClient {
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: DEFAULT_API_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// One system+user round trip. Returns the first choice's content and
    /// the token usage the provider reported.
    pub async fn chat(&self, system: &str, user: &str) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                RequestMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                RequestMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
        };

        debug!(model = %self.model, "chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM API error ({status}): {error_text}"));
        }

        let parsed: ChatResponse = response.json().await?;
        let usage = parsed.usage.unwrap_or_default();
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No content in chat response"))?;

        Ok(Completion {
            content,
            usage,
            model: self.model.clone(),
        })
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("No embedding in response"))
    }

    /// Embed multiple texts in one request. Output order matches input order.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.embed_texts(texts).await
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let expected = texts.len();
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: texts,
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Embedding API error ({status}): {error_text}"));
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != expected {
            return Err(anyhow!(
                "Embedding response has {} vectors for {} inputs",
                parsed.data.len(),
                expected
            ));
        }

        // Providers are allowed to reorder; the index field is authoritative.
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
