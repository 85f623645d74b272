//! Boundary traits for every external collaborator.
//!
//! The engine crates only see these; concrete backends (LLM API, Qdrant,
//! Postgres, webhooks) live behind them so tests can swap in the in-memory
//! doubles from `pulsewire-engine::testing`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Message, TokenUsage, Translated, TranslationPriority, VectorMatch, VectorMeta};

/// Maps text to a fixed-dimension vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Approximate nearest-neighbor store over message embeddings.
///
/// Append/query-only from this system's perspective. `query` returns
/// matches in descending score order and may include the query's own
/// vector; callers exclude self-matches.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether the index can serve upserts and queries right now. Dedup
    /// fails open (batch passes through unmarked) when this is false.
    async fn is_ready(&self) -> bool;

    /// Insert or replace a vector. Returns the index key for the point.
    async fn upsert(&self, id: &str, vector: Vec<f32>, meta: VectorMeta) -> Result<String>;

    /// Top-k most similar vectors, optionally restricted to points with
    /// `published_at_ts >= newer_than` (epoch seconds).
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        newer_than: Option<i64>,
    ) -> Result<Vec<VectorMatch>>;
}

/// Opaque translation capability. Batch framing (separator join/split) is
/// the scheduler's concern; prompt framing is the implementor's.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<Translated>;
}

/// Persisted translation results keyed by (message, target language).
#[async_trait]
pub trait TranslationCache: Send + Sync {
    async fn get(&self, message_id: Uuid, lang: &str) -> Result<Option<String>>;
    async fn put(&self, message_id: Uuid, lang: &str, text: &str, token_count: u32) -> Result<()>;
}

/// Message persistence at the granularity the pipeline needs. CRUD beyond
/// these operations belongs to the API layer, not this core.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Messages that have not been through a dedup pass yet (no
    /// embedding_id), oldest fetched first.
    async fn recent_unprocessed(&self, limit: usize) -> Result<Vec<Message>>;

    /// Messages with `needs_translation = true` and priority other than
    /// skip, ordered by (channel, priority) with high drained first.
    async fn pending_translations(&self, limit: usize) -> Result<Vec<Message>>;

    /// Persist the dedup engine's output fields for one message.
    async fn update_dedup_fields(&self, message: &Message) -> Result<()>;

    /// Persist a classifier decision.
    async fn update_priority(
        &self,
        id: Uuid,
        priority: TranslationPriority,
        needs_translation: bool,
    ) -> Result<()>;

    /// Record a successful translation.
    async fn mark_translated(
        &self,
        id: Uuid,
        text: &str,
        translated_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Durable store of jobs that exhausted their retry budget.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn insert(&self, job_name: &str, error: &str, trace: &str, attempts: u32) -> Result<()>;
}

/// Cost accounting for provider calls.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn record(
        &self,
        provider: &str,
        model: &str,
        purpose: &str,
        usage: TokenUsage,
    ) -> Result<()>;
}

/// Fire-and-forget event publication. Callers treat failures as
/// best-effort: log and move on, never fail the critical path.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event_type: &str, payload: serde_json::Value) -> Result<()>;
}

/// Counters and job timings. Backed by tracing in the worker, by an
/// in-memory recorder in tests.
pub trait MetricsSink: Send + Sync {
    fn job_succeeded(&self, job_name: &str, duration: std::time::Duration);
    fn job_failed(&self, job_name: &str, duration: std::time::Duration);
    fn incr(&self, counter: &str);
}
