//! In-memory vector index: brute-force cosine over an RwLock'd Vec.
//!
//! Fine for the volumes a single worker sees inside one recency window;
//! anything bigger belongs in Qdrant.

use anyhow::Result;
use async_trait::async_trait;

use pulsewire_common::{VectorIndex, VectorMatch, VectorMeta};

struct Entry {
    id: String,
    vector: Vec<f32>,
    meta: VectorMeta,
}

#[derive(Default)]
pub struct MemoryVectorIndex {
    entries: std::sync::RwLock<Vec<Entry>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn is_ready(&self) -> bool {
        true
    }

    async fn upsert(&self, id: &str, vector: Vec<f32>, meta: VectorMeta) -> Result<String> {
        let mut entries = self.entries.write().expect("index lock poisoned");
        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                existing.vector = vector;
                existing.meta = meta;
            }
            None => entries.push(Entry {
                id: id.to_string(),
                vector,
                meta,
            }),
        }
        Ok(id.to_string())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        newer_than: Option<i64>,
    ) -> Result<Vec<VectorMatch>> {
        let entries = self.entries.read().expect("index lock poisoned");
        let mut matches: Vec<VectorMatch> = entries
            .iter()
            .filter(|e| match (newer_than, e.meta.published_at_ts) {
                (Some(cutoff), Some(ts)) => ts >= cutoff,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|e| VectorMatch {
                id: e.id.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// Cosine similarity for f32 embedding vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn meta(ts: Option<i64>) -> VectorMeta {
        VectorMeta {
            message_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            published_at_ts: ts,
        }
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![0.3, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn query_returns_descending_scores() {
        let index = MemoryVectorIndex::new();
        index.upsert("a", vec![1.0, 0.0], meta(None)).await.unwrap();
        index.upsert("b", vec![0.9, 0.1], meta(None)).await.unwrap();
        index.upsert("c", vec![0.0, 1.0], meta(None)).await.unwrap();

        let matches = index.query(&[1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(matches[0].id, "a");
        assert!(matches[0].score >= matches[1].score);
        assert!(matches[1].score >= matches[2].score);
    }

    #[tokio::test]
    async fn query_respects_top_k() {
        let index = MemoryVectorIndex::new();
        for i in 0..10 {
            index
                .upsert(&format!("m{i}"), vec![1.0, i as f32 * 0.01], meta(None))
                .await
                .unwrap();
        }
        let matches = index.query(&[1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(matches.len(), 3);
    }

    #[tokio::test]
    async fn recency_filter_excludes_old_and_undated_points() {
        let index = MemoryVectorIndex::new();
        index.upsert("old", vec![1.0, 0.0], meta(Some(100))).await.unwrap();
        index.upsert("new", vec![1.0, 0.0], meta(Some(200))).await.unwrap();
        index.upsert("undated", vec![1.0, 0.0], meta(None)).await.unwrap();

        let matches = index.query(&[1.0, 0.0], 10, Some(150)).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_id() {
        let index = MemoryVectorIndex::new();
        index.upsert("a", vec![1.0, 0.0], meta(None)).await.unwrap();
        index.upsert("a", vec![0.0, 1.0], meta(None)).await.unwrap();
        assert_eq!(index.len(), 1);

        let matches = index.query(&[0.0, 1.0], 1, None).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }
}
