//! Adapters binding concrete backends to the common boundary traits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use llm_client::LlmClient;
use pulsewire_common::{
    MetricsSink, NotificationSink, TextEmbedder, TokenUsage, Translated, TranslationProvider,
};
use pulsewire_engine::translator::SEGMENT_TOKEN;

// --- Embedder ---

/// `TextEmbedder` over the shared LLM client.
pub struct Embedder {
    client: Arc<LlmClient>,
}

impl Embedder {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}

// --- Translator ---

/// `TranslationProvider` over the chat endpoint. Prompt framing lives
/// here; the scheduler owns segment join/split.
pub struct LlmTranslator {
    client: Arc<LlmClient>,
}

impl LlmTranslator {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }

    fn system_prompt(source_lang: Option<&str>, target_lang: &str) -> String {
        let source = match source_lang {
            Some(code) => format!("from {}", language_name(code)),
            None => "from the language it is written in".to_string(),
        };
        format!(
            "You are a professional translator for news monitoring. \
             Translate the following channel post {source} to {target}. \
             Return ONLY the translated text, nothing else. \
             Preserve proper nouns, handles, numbers, and URLs as-is. \
             The input may contain several segments separated by the token \
             {SEGMENT_TOKEN}; translate each segment independently and keep \
             every separator token exactly where it appears.",
            target = language_name(target_lang),
        )
    }
}

#[async_trait]
impl TranslationProvider for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<Translated> {
        let system = Self::system_prompt(source_lang, target_lang);
        let completion = self.client.chat(&system, text).await?;
        Ok(Translated {
            text: completion.content.trim().to_string(),
            usage: TokenUsage {
                prompt_tokens: completion.usage.prompt_tokens,
                completion_tokens: completion.usage.completion_tokens,
            },
            model: completion.model,
        })
    }
}

/// Human-readable names for the languages this deployment commonly sees;
/// anything else goes through as its code, which models handle fine.
fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "ar" => "Arabic",
        "fa" => "Persian",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        other => other,
    }
}

// --- Notifiers ---

/// POSTs each event to a configured webhook. Callers treat publishes as
/// best-effort, so delivery failures surface only as warnings there.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn publish(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        let body = serde_json::json!({ "event": event_type, "payload": payload });
        let resp = self.http.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook returned {}", resp.status());
        }
        Ok(())
    }
}

/// Log-only sink for deployments without a webhook.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn publish(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        debug!(event = event_type, payload = %payload, "Event published");
        Ok(())
    }
}

// --- Metrics ---

/// Emits metrics as structured log lines, which is where this
/// deployment's dashboards read from.
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn job_succeeded(&self, job_name: &str, duration: Duration) {
        info!(
            job = job_name,
            duration_ms = duration.as_millis() as u64,
            outcome = "success",
            "Job metric"
        );
    }

    fn job_failed(&self, job_name: &str, duration: Duration) {
        info!(
            job = job_name,
            duration_ms = duration.as_millis() as u64,
            outcome = "failure",
            "Job metric"
        );
    }

    fn incr(&self, counter: &str) {
        debug!(counter, "Counter incremented");
    }
}
