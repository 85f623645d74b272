//! Small single-table adapters: translation cache, dead letters, usage ledger.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use pulsewire_common::{DeadLetterStore, TokenUsage, TranslationCache, UsageLedger};

pub struct PgTranslationCache {
    pool: PgPool,
}

impl PgTranslationCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TranslationCache for PgTranslationCache {
    async fn get(&self, message_id: Uuid, lang: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT translated_text FROM translation_cache WHERE message_id = $1 AND lang = $2",
        )
        .bind(message_id)
        .bind(lang)
        .fetch_optional(&self.pool)
        .await
        .context("translation cache get")?;
        Ok(row.map(|r| r.0))
    }

    async fn put(&self, message_id: Uuid, lang: &str, text: &str, token_count: u32) -> Result<()> {
        sqlx::query(
            "INSERT INTO translation_cache (message_id, lang, translated_text, token_count)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (message_id, lang) DO UPDATE
             SET translated_text = EXCLUDED.translated_text,
                 token_count = EXCLUDED.token_count",
        )
        .bind(message_id)
        .bind(lang)
        .bind(text)
        .bind(token_count as i32)
        .execute(&self.pool)
        .await
        .context("translation cache put")?;
        Ok(())
    }
}

pub struct PgDeadLetterStore {
    pool: PgPool,
}

impl PgDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterStore for PgDeadLetterStore {
    async fn insert(&self, job_name: &str, error: &str, trace: &str, attempts: u32) -> Result<()> {
        sqlx::query(
            "INSERT INTO dead_letters (job_name, error, trace, attempts) VALUES ($1, $2, $3, $4)",
        )
        .bind(job_name)
        .bind(error)
        .bind(trace)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await
        .context("insert dead letter")?;
        Ok(())
    }
}

pub struct PgUsageLedger {
    pool: PgPool,
}

impl PgUsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLedger for PgUsageLedger {
    async fn record(
        &self,
        provider: &str,
        model: &str,
        purpose: &str,
        usage: TokenUsage,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_ledger (provider, model, purpose, prompt_tokens, completion_tokens)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(provider)
        .bind(model)
        .bind(purpose)
        .bind(usage.prompt_tokens as i32)
        .bind(usage.completion_tokens as i32)
        .execute(&self.pool)
        .await
        .context("record token usage")?;
        Ok(())
    }
}
