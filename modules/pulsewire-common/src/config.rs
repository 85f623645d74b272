use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM provider (OpenAI-compatible API)
    pub llm_api_key: String,
    pub llm_base_url: Option<String>,
    pub llm_model: String,
    pub embedding_model: String,

    // Vector index (Qdrant). None = in-memory index.
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub embedding_dim: usize,

    // Translation
    pub target_language: String,
    pub translation_concurrency: usize,
    pub translation_batch_size: usize,

    // Dedup
    pub similarity_threshold: f64,
    pub dedup_top_k: usize,
    /// Sliding recency window for similarity search, in hours.
    pub dedup_window_hours: i64,

    // Priority tiers
    pub priority_high_hours: i64,
    pub priority_normal_hours: i64,

    // Job retry
    pub job_max_attempts: u32,
    pub job_base_delay_secs: u64,
    pub job_max_delay_secs: u64,

    // Worker cadence
    pub worker_interval_secs: u64,
    pub intake_batch_size: usize,

    // Notifications. None = log-only sink.
    pub notify_webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            llm_api_key: required_env("LLM_API_KEY"),
            llm_base_url: optional_env("LLM_BASE_URL"),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            qdrant_url: optional_env("QDRANT_URL"),
            qdrant_api_key: optional_env("QDRANT_API_KEY"),
            qdrant_collection: env_or("QDRANT_COLLECTION", "pulsewire_messages"),
            embedding_dim: parsed_env("EMBEDDING_DIM", 1536),
            target_language: env_or("TARGET_LANGUAGE", "en"),
            translation_concurrency: parsed_env("TRANSLATION_CONCURRENCY", 12),
            translation_batch_size: parsed_env("TRANSLATION_BATCH_SIZE", 25),
            similarity_threshold: parsed_env("SIMILARITY_THRESHOLD", 0.85),
            dedup_top_k: parsed_env("DEDUP_TOP_K", 5),
            dedup_window_hours: parsed_env("DEDUP_WINDOW_HOURS", 168),
            priority_high_hours: parsed_env("PRIORITY_HIGH_HOURS", 6),
            priority_normal_hours: parsed_env("PRIORITY_NORMAL_HOURS", 72),
            job_max_attempts: parsed_env("JOB_MAX_ATTEMPTS", 3),
            job_base_delay_secs: parsed_env("JOB_BASE_DELAY_SECS", 1),
            job_max_delay_secs: parsed_env("JOB_MAX_DELAY_SECS", 60),
            worker_interval_secs: parsed_env("WORKER_INTERVAL_SECS", 300),
            intake_batch_size: parsed_env("INTAKE_BATCH_SIZE", 200),
            notify_webhook_url: optional_env("NOTIFY_WEBHOOK_URL"),
        }
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            llm_model = self.llm_model.as_str(),
            embedding_model = self.embedding_model.as_str(),
            qdrant = self.qdrant_url.as_deref().unwrap_or("(in-memory)"),
            collection = self.qdrant_collection.as_str(),
            target_language = self.target_language.as_str(),
            translation_concurrency = self.translation_concurrency,
            similarity_threshold = self.similarity_threshold,
            dedup_window_hours = self.dedup_window_hours,
            worker_interval_secs = self.worker_interval_secs,
            "Config loaded (keys redacted)"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number, got: {v}")),
        Err(_) => default,
    }
}
