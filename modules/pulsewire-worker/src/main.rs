use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use llm_client::LlmClient;
use pulsewire_common::{
    Config, DeadLetterStore, MessageStore, MetricsSink, NotificationSink, TextEmbedder,
    TranslationCache, TranslationProvider, UsageLedger, VectorIndex,
};
use pulsewire_engine::jobs::{intake_job, translation_job, IntakeConfig};
use pulsewire_engine::{
    run_job, DedupConfig, DedupEngine, PriorityConfig, RetryPolicy, TranslationScheduler,
    TranslatorConfig,
};
use pulsewire_index::{MemoryVectorIndex, QdrantIndex};
use pulsewire_store::{
    migrate, CachedEmbedder, PgDeadLetterStore, PgMessageStore, PgTranslationCache, PgUsageLedger,
};

mod infra;

use infra::{Embedder, LlmTranslator, LogNotifier, TracingMetrics, WebhookNotifier};

#[derive(Parser)]
#[command(name = "pulsewire-worker", about = "Dedup and translation worker")]
struct Cli {
    /// Run one intake + translation cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsewire=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!("Pulsewire worker starting...");

    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;

    // One LLM client shared by the embedder and the translator.
    let mut llm = LlmClient::new(config.llm_api_key.as_str(), config.llm_model.as_str())
        .with_embedding_model(config.embedding_model.as_str());
    if let Some(base_url) = &config.llm_base_url {
        llm = llm.with_base_url(base_url.as_str());
    }
    let llm = Arc::new(llm);

    // Embeddings go through the Postgres get-or-compute cache so re-runs
    // over processed batches cost no provider calls.
    let embedder: Arc<dyn TextEmbedder> = Arc::new(CachedEmbedder::new(
        pool.clone(),
        Arc::new(Embedder::new(llm.clone())),
        config.embedding_model.clone(),
    ));

    let index: Arc<dyn VectorIndex> = match &config.qdrant_url {
        Some(url) => {
            let qdrant = QdrantIndex::new(url, &config.qdrant_collection, config.qdrant_api_key.as_deref());
            qdrant.ensure_collection(config.embedding_dim).await?;
            Arc::new(qdrant)
        }
        None => {
            info!("No QDRANT_URL configured, using in-memory vector index");
            Arc::new(MemoryVectorIndex::new())
        }
    };

    let store: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(pool.clone()));
    let cache: Arc<dyn TranslationCache> = Arc::new(PgTranslationCache::new(pool.clone()));
    let ledger: Arc<dyn UsageLedger> = Arc::new(PgUsageLedger::new(pool.clone()));
    let dead_letters: Arc<dyn DeadLetterStore> = Arc::new(PgDeadLetterStore::new(pool.clone()));
    let metrics: Arc<dyn MetricsSink> = Arc::new(TracingMetrics);
    let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };

    let engine = DedupEngine::new(
        embedder,
        index,
        DedupConfig {
            similarity_threshold: config.similarity_threshold,
            top_k: config.dedup_top_k,
        },
    );
    let priority_config = PriorityConfig::new(config.priority_high_hours, config.priority_normal_hours);
    let intake_config = IntakeConfig {
        batch_size: config.intake_batch_size,
        dedup_window_hours: config.dedup_window_hours,
    };

    // The process-wide translation concurrency cap. Exactly one instance,
    // shared by every call site.
    let semaphore = Arc::new(Semaphore::new(config.translation_concurrency));
    let provider: Arc<dyn TranslationProvider> = Arc::new(LlmTranslator::new(llm));
    let scheduler = TranslationScheduler::new(
        provider,
        cache,
        store.clone(),
        notifier,
        ledger,
        metrics.clone(),
        semaphore,
        TranslatorConfig {
            batch_size: config.translation_batch_size,
            ..Default::default()
        },
    );

    let policy = RetryPolicy {
        max_attempts: config.job_max_attempts,
        base_delay: Duration::from_secs(config.job_base_delay_secs),
        max_delay: Duration::from_secs(config.job_max_delay_secs),
        jitter: true,
    };

    let mut interval = tokio::time::interval(Duration::from_secs(config.worker_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        run_job("intake", &policy, dead_letters.as_ref(), metrics.as_ref(), || {
            intake_job(&store, &engine, &priority_config, &intake_config)
        })
        .await;

        run_job(
            "translation",
            &policy,
            dead_letters.as_ref(),
            metrics.as_ref(),
            || translation_job(&scheduler),
        )
        .await;

        if cli.once {
            info!("Single cycle complete, exiting");
            break;
        }
    }

    Ok(())
}
