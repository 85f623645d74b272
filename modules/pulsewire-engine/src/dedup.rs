//! Duplicate-group assignment over a batch of messages.
//!
//! Processes oldest-first so the earliest member of every duplicate set
//! becomes its anchor, which keeps group ids stable across re-runs and
//! avoids a separate group-merge pass. Dedup fails open: when the vector
//! index is not ready, the batch passes through unmarked rather than
//! blocking ingestion.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use pulsewire_common::{Message, TextEmbedder, VectorIndex, VectorMeta};

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum similarity (0-1) for a candidate to count as a duplicate.
    pub similarity_threshold: f64,
    /// How many nearest neighbors to consider per message.
    pub top_k: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            top_k: 5,
        }
    }
}

pub struct DedupEngine {
    embedder: Arc<dyn TextEmbedder>,
    index: Arc<dyn VectorIndex>,
    config: DedupConfig,
}

impl DedupEngine {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        index: Arc<dyn VectorIndex>,
        config: DedupConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Assign duplicate status and group ids for every message in the
    /// batch. Mutates dedup fields in place and returns the batch sorted
    /// oldest-first.
    ///
    /// `cutoff` bounds the similarity search to vectors published at or
    /// after that instant, so old content cannot capture new messages.
    pub async fn assign_groups(
        &self,
        mut batch: Vec<Message>,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        if batch.is_empty() {
            return Ok(batch);
        }

        if !self.index.is_ready().await {
            warn!(
                batch_size = batch.len(),
                "Vector index not ready, passing batch through unmarked"
            );
            return Ok(batch);
        }

        // Oldest first. The sort is stable, so equal timestamps keep
        // their ingestion order and anchor selection stays deterministic.
        batch.sort_by_key(|m| m.effective_timestamp());

        let lookup: HashMap<String, usize> = batch
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.to_string(), i))
            .collect();
        let cutoff_ts = cutoff.map(|c| c.timestamp());

        for i in 0..batch.len() {
            if let Err(e) = self.process_message(&mut batch, &lookup, i, cutoff_ts).await {
                // One bad embedding or index call must not sink the batch.
                warn!(
                    message_id = %batch[i].id,
                    error = %e,
                    "Dedup failed for message, leaving fields unchanged"
                );
            }
        }

        Ok(batch)
    }

    async fn process_message(
        &self,
        batch: &mut [Message],
        lookup: &HashMap<String, usize>,
        i: usize,
        cutoff_ts: Option<i64>,
    ) -> Result<()> {
        let text = batch[i].dedup_text().trim().to_string();
        if text.is_empty() {
            return Ok(());
        }

        let embedding = self.embedder.embed(&text).await?;

        if batch[i].embedding_id.is_none() {
            let meta = VectorMeta {
                message_id: batch[i].id,
                channel_id: batch[i].channel_id,
                published_at_ts: batch[i].published_at.map(|t| t.timestamp()),
            };
            let key = self
                .index
                .upsert(&batch[i].id.to_string(), embedding.clone(), meta)
                .await?;
            batch[i].embedding_id = Some(key);
        }

        let matches = self
            .index
            .query(&embedding, self.config.top_k, cutoff_ts)
            .await?;

        // Results arrive in descending score order, so the first
        // qualifying non-self entry is the best match; equal scores keep
        // the index's ordering.
        let self_id = batch[i].id.to_string();
        let best = matches
            .iter()
            .filter(|m| m.id != self_id)
            .find(|m| m.score >= self.config.similarity_threshold);

        let Some(best) = best else {
            let message = &mut batch[i];
            message.is_duplicate = false;
            message.duplicate_group_id = None;
            message.originality_score = 100;
            return Ok(());
        };

        let group_id = match lookup.get(&best.id) {
            Some(&j) => match batch[j].duplicate_group_id {
                Some(group) => group,
                None => {
                    // First time this message is matched: promote it to
                    // group anchor. Anchors are never duplicates.
                    let anchor_id = batch[j].id;
                    let anchor = &mut batch[j];
                    anchor.duplicate_group_id = Some(anchor_id);
                    anchor.is_duplicate = false;
                    anchor.originality_score = 100;
                    debug!(anchor_id = %anchor_id, "Promoted message to group anchor");
                    anchor_id
                }
            },
            None => {
                // Matched a vector persisted by a prior run. The index
                // stores message ids as point ids, so adopt the foreign id
                // as the group when it parses; otherwise mint a fresh one.
                Uuid::parse_str(&best.id).unwrap_or_else(|_| {
                    warn!(candidate_id = best.id.as_str(), "Unparseable match id, generating group id");
                    Uuid::new_v4()
                })
            }
        };

        // Re-runs: an anchor matching one of its own group members would
        // otherwise mark itself a duplicate of itself. Re-confirm anchor
        // status instead so repeated passes converge.
        if group_id == batch[i].id {
            let message = &mut batch[i];
            message.is_duplicate = false;
            message.duplicate_group_id = Some(group_id);
            message.originality_score = 100;
            return Ok(());
        }

        let score = best.score;
        let message = &mut batch[i];
        message.is_duplicate = true;
        message.duplicate_group_id = Some(group_id);
        message.originality_score = originality_score(score);
        debug!(
            message_id = %message.id,
            group_id = %group_id,
            similarity = score,
            "Marked message as duplicate"
        );

        Ok(())
    }
}

/// 100 minus the best-match similarity, clamped to 0-100.
fn originality_score(similarity: f64) -> i32 {
    (((1.0 - similarity) * 100.0).round() as i32).clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn originality_inverts_similarity() {
        assert_eq!(originality_score(1.0), 0);
        assert_eq!(originality_score(0.85), 15);
        assert_eq!(originality_score(0.0), 100);
    }

    #[test]
    fn originality_clamps_out_of_range_scores() {
        assert_eq!(originality_score(1.2), 0);
        assert_eq!(originality_score(-0.5), 100);
    }
}
