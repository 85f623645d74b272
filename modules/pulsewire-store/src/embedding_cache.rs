use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::debug;

use pulsewire_common::TextEmbedder;

/// Get-or-compute embedding cache backed by Postgres.
///
/// Keyed by SHA-256 of (model_version + input_text). On cache hit, returns
/// the stored embedding without touching the provider; on miss, computes
/// via the underlying `TextEmbedder`, stores the result, and returns it.
/// Re-running dedup over an already-processed batch therefore costs no
/// provider calls.
pub struct CachedEmbedder {
    pool: PgPool,
    inner: Arc<dyn TextEmbedder>,
    model_version: String,
}

impl CachedEmbedder {
    pub fn new(pool: PgPool, inner: Arc<dyn TextEmbedder>, model_version: String) -> Self {
        Self {
            pool,
            inner,
            model_version,
        }
    }

    fn hash_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model_version.as_bytes());
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn lookup(&self, hash: &str) -> Result<Option<Vec<f32>>> {
        let cached: Option<(Vec<f32>,)> =
            sqlx::query_as("SELECT embedding FROM embedding_cache WHERE input_hash = $1")
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(cached.map(|r| r.0))
    }

    async fn store(&self, hash: &str, embedding: &[f32]) -> Result<()> {
        sqlx::query(
            "INSERT INTO embedding_cache (input_hash, model_version, embedding)
             VALUES ($1, $2, $3)
             ON CONFLICT (input_hash) DO NOTHING",
        )
        .bind(hash)
        .bind(&self.model_version)
        .bind(embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TextEmbedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = self.hash_key(text);
        if let Some(embedding) = self.lookup(&hash).await? {
            return Ok(embedding);
        }

        let embedding = self.inner.embed(text).await?;
        self.store(&hash, &embedding).await?;
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        // Split hits from misses, embed the misses in one provider call,
        // then stitch results back in input order.
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut missing: Vec<(usize, String, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let hash = self.hash_key(text);
            match self.lookup(&hash).await? {
                Some(embedding) => results[i] = Some(embedding),
                None => missing.push((i, hash, text.clone())),
            }
        }

        if !missing.is_empty() {
            let to_embed: Vec<String> = missing.iter().map(|(_, _, t)| t.clone()).collect();
            let computed = self.inner.embed_batch(to_embed).await?;
            debug!(count = computed.len(), "Warmed embedding cache");

            for ((i, hash, _), embedding) in missing.into_iter().zip(computed.into_iter()) {
                self.store(&hash, &embedding).await?;
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}
