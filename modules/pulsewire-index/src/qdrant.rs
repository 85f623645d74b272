//! Qdrant REST adapter.
//!
//! Point ids are message UUIDs; `VectorMeta` fields go in the payload so
//! the recency filter can run server-side. Collection distance is cosine,
//! so scores come back already normalized.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use pulsewire_common::{VectorIndex, VectorMatch, VectorMeta};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    pub fn new(base_url: &str, collection: &str, api_key: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key: api_key.map(String::from),
        }
    }

    /// Create the collection if it does not exist yet. Idempotent; run at
    /// startup before the first upsert.
    pub async fn ensure_collection(&self, vector_size: usize) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let exists = self.request(self.http.get(&url)).send().await?;
        if exists.status().is_success() {
            return Ok(());
        }

        debug!(collection = self.collection.as_str(), vector_size, "Creating collection");
        let body = json!({
            "vectors": { "size": vector_size, "distance": "Cosine" }
        });
        let resp = self.request(self.http.put(&url)).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Qdrant create collection failed ({status}): {text}"));
        }
        Ok(())
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn is_ready(&self) -> bool {
        let url = format!("{}/readyz", self.base_url);
        match self.request(self.http.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Qdrant readiness probe failed");
                false
            }
        }
    }

    async fn upsert(&self, id: &str, vector: Vec<f32>, meta: VectorMeta) -> Result<String> {
        let url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, self.collection
        );
        let body = json!({
            "points": [{
                "id": id,
                "vector": vector,
                "payload": {
                    "message_id": meta.message_id.to_string(),
                    "channel_id": meta.channel_id.to_string(),
                    "published_at_ts": meta.published_at_ts,
                }
            }]
        });

        let resp = self.request(self.http.put(&url)).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Qdrant upsert failed ({status}): {text}"));
        }
        Ok(id.to_string())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        newer_than: Option<i64>,
    ) -> Result<Vec<VectorMatch>> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );

        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": false,
        });
        if let Some(cutoff) = newer_than {
            body["filter"] = json!({
                "must": [{ "key": "published_at_ts", "range": { "gte": cutoff } }]
            });
        }

        let resp = self.request(self.http.post(&url)).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Qdrant search failed ({status}): {text}"));
        }

        #[derive(serde::Deserialize)]
        struct SearchResponse {
            result: Vec<ScoredPoint>,
        }
        #[derive(serde::Deserialize)]
        struct ScoredPoint {
            id: serde_json::Value,
            score: f64,
        }

        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed
            .result
            .into_iter()
            .map(|p| VectorMatch {
                // Point ids can be strings or numbers on the wire.
                id: match p.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                score: p.score,
            })
            .collect())
    }
}
