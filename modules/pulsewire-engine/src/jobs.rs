//! The two background jobs the worker loop runs.
//!
//! `intake_job` stamps priority and dedup fields on newly ingested
//! messages; `translation_job` drains the pending translation queue. Both
//! are meant to run inside `retry::run_job`.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use pulsewire_common::{Message, MessageStore, TranslationPriority};

use crate::dedup::DedupEngine;
use crate::priority::{classify, PriorityConfig};
use crate::translator::{TranslationRunStats, TranslationScheduler};

#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Messages pulled per intake run.
    pub batch_size: usize,
    /// Sliding recency window for the similarity search, in hours.
    pub dedup_window_hours: i64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            dedup_window_hours: 168,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntakeStats {
    pub examined: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub queued_for_translation: usize,
}

/// Process newly ingested messages: classify translation priority, assign
/// duplicate groups, persist both.
///
/// Duplicate status gates translation: a message marked duplicate keeps
/// its classified priority but is taken off the translation queue, since
/// its group anchor already carries the content.
pub async fn intake_job(
    store: &Arc<dyn MessageStore>,
    engine: &DedupEngine,
    priority_config: &PriorityConfig,
    config: &IntakeConfig,
) -> Result<IntakeStats> {
    let mut batch: Vec<Message> = store.recent_unprocessed(config.batch_size).await?;
    if batch.is_empty() {
        return Ok(IntakeStats::default());
    }

    let now = Utc::now();
    for message in &mut batch {
        let priority = classify(
            &message.original_text,
            message.source_language.as_deref(),
            &message.target_language,
            message.published_at,
            now,
            priority_config,
        );
        message.translation_priority = priority;
        if priority == TranslationPriority::Skip {
            message.needs_translation = false;
        }
    }

    let cutoff = now - Duration::hours(config.dedup_window_hours);
    let mut batch = engine.assign_groups(batch, Some(cutoff)).await?;

    let mut stats = IntakeStats {
        examined: batch.len(),
        ..Default::default()
    };

    for message in &mut batch {
        if message.is_duplicate {
            message.needs_translation = false;
            stats.duplicates += 1;
        }
        match message.translation_priority {
            TranslationPriority::Skip => stats.skipped += 1,
            _ if message.needs_translation => stats.queued_for_translation += 1,
            _ => {}
        }
        store
            .update_priority(
                message.id,
                message.translation_priority,
                message.needs_translation,
            )
            .await?;
        store.update_dedup_fields(message).await?;
    }

    info!(
        examined = stats.examined,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        queued = stats.queued_for_translation,
        "Intake run complete"
    );

    Ok(stats)
}

/// Drain the pending translation queue once.
pub async fn translation_job(scheduler: &TranslationScheduler) -> Result<TranslationRunStats> {
    scheduler.process_pending().await
}
