//! Translation scheduling: cache-first, priority-ordered, batched provider
//! calls under a process-wide concurrency cap.
//!
//! The semaphore is the backpressure mechanism protecting the provider:
//! every individual provider invocation holds a permit for exactly the
//! duration of the call, no matter how many batches or callers are active.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use pulsewire_common::{
    Message, MessageStore, MetricsSink, NotificationSink, PulsewireError, TokenUsage,
    TranslationCache, TranslationProvider, UsageLedger,
};

/// Reserved separator between segments of a combined batch request. Chosen
/// so it cannot plausibly appear in channel content and survives an LLM
/// echoing it back verbatim.
pub const SEGMENT_TOKEN: &str = "<<<SEG>>>";

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Messages pulled from the store per page.
    pub batch_size: usize,
    /// Maximum segments combined into one provider request.
    pub max_group_size: usize,
    /// Provider label recorded in the usage ledger.
    pub provider_label: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            max_group_size: 10,
            provider_label: "openai".to_string(),
        }
    }
}

/// Outcome counts for one scheduling run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TranslationRunStats {
    pub examined: usize,
    pub cache_hits: usize,
    pub translated: usize,
    pub failed: usize,
    pub batch_fallbacks: usize,
}

pub struct TranslationScheduler {
    provider: Arc<dyn TranslationProvider>,
    cache: Arc<dyn TranslationCache>,
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn NotificationSink>,
    ledger: Arc<dyn UsageLedger>,
    metrics: Arc<dyn MetricsSink>,
    /// Shared process-wide; constructed once at startup and injected.
    semaphore: Arc<Semaphore>,
    config: TranslatorConfig,
}

impl TranslationScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        cache: Arc<dyn TranslationCache>,
        store: Arc<dyn MessageStore>,
        notifier: Arc<dyn NotificationSink>,
        ledger: Arc<dyn UsageLedger>,
        metrics: Arc<dyn MetricsSink>,
        semaphore: Arc<Semaphore>,
        config: TranslatorConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            store,
            notifier,
            ledger,
            metrics,
            semaphore,
            config,
        }
    }

    /// Drain pending translation work in priority order.
    ///
    /// Pages through the store until it runs dry. Messages whose
    /// translation fails stay pending for the next run; the operation only
    /// errors when every attempted provider call failed, so the job retry
    /// boundary engages on systemic outages but not on isolated bad
    /// messages.
    pub async fn process_pending(&self) -> Result<TranslationRunStats> {
        let mut stats = TranslationRunStats::default();
        let mut attempted: HashSet<Uuid> = HashSet::new();

        loop {
            let page = self.store.pending_translations(self.config.batch_size).await?;
            // Failed messages come back on the next page; skip anything
            // already attempted this run so the loop terminates.
            let fresh: Vec<Message> = page
                .into_iter()
                .filter(|m| attempted.insert(m.id))
                .collect();
            if fresh.is_empty() {
                break;
            }
            self.process_page(fresh, &mut stats).await;
        }

        info!(
            examined = stats.examined,
            cache_hits = stats.cache_hits,
            translated = stats.translated,
            failed = stats.failed,
            batch_fallbacks = stats.batch_fallbacks,
            "Translation run complete"
        );

        if stats.failed > 0 && stats.translated == 0 && stats.cache_hits == 0 {
            return Err(PulsewireError::Translation(format!(
                "all {} translation attempts failed this run",
                stats.failed
            ))
            .into());
        }

        Ok(stats)
    }

    async fn process_page(&self, messages: Vec<Message>, stats: &mut TranslationRunStats) {
        stats.examined += messages.len();

        // Cache first: a hit never touches the provider.
        let mut misses: Vec<Message> = Vec::new();
        for message in messages {
            match self.cache.get(message.id, &message.target_language).await {
                Ok(Some(cached)) => {
                    self.metrics.incr("translation.cache_hit");
                    match self.apply_translation(&message, &cached, None).await {
                        Ok(()) => stats.cache_hits += 1,
                        Err(e) => {
                            warn!(message_id = %message.id, error = %e, "Failed to apply cached translation");
                            stats.failed += 1;
                        }
                    }
                }
                Ok(None) => {
                    self.metrics.incr("translation.cache_miss");
                    misses.push(message);
                }
                Err(e) => {
                    // Cache trouble must not block translation.
                    warn!(message_id = %message.id, error = %e, "Translation cache read failed");
                    misses.push(message);
                }
            }
        }

        // Group same-language work so it shares one provider round trip.
        let mut groups: HashMap<(Option<String>, String), Vec<Message>> = HashMap::new();
        for message in misses {
            groups
                .entry((message.source_language.clone(), message.target_language.clone()))
                .or_default()
                .push(message);
        }

        for ((source, target), group) in groups {
            for chunk in group.chunks(self.config.max_group_size) {
                self.translate_chunk(chunk, source.as_deref(), &target, stats)
                    .await;
            }
        }
    }

    async fn translate_chunk(
        &self,
        messages: &[Message],
        source: Option<&str>,
        target: &str,
        stats: &mut TranslationRunStats,
    ) {
        if messages.len() == 1 {
            match self.translate_single(&messages[0], source, target).await {
                Ok(()) => stats.translated += 1,
                Err(e) => {
                    warn!(message_id = %messages[0].id, error = %e, "Translation failed");
                    stats.failed += 1;
                }
            }
            return;
        }

        let combined: String = messages
            .iter()
            .map(|m| m.original_text.as_str())
            .collect::<Vec<_>>()
            .join(&format!("\n{SEGMENT_TOKEN}\n"));

        let result = match self.semaphore.acquire().await {
            Ok(_permit) => self.provider.translate(&combined, source, target).await,
            Err(_) => Err(anyhow!("translation semaphore closed")),
        };

        let translated = match result {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    segments = messages.len(),
                    error = %e,
                    "Batch translation call failed, messages stay pending"
                );
                stats.failed += messages.len();
                return;
            }
        };

        let segments = split_segments(&translated.text);

        if segments.len() != messages.len() {
            // Provider violated the batching contract. Never guess at the
            // alignment; retranslate each message on its own.
            warn!(
                expected = messages.len(),
                got = segments.len(),
                "Batch translation returned wrong segment count, falling back to sequential"
            );
            stats.batch_fallbacks += 1;
            for message in messages {
                match self.translate_single(message, source, target).await {
                    Ok(()) => stats.translated += 1,
                    Err(e) => {
                        warn!(message_id = %message.id, error = %e, "Fallback translation failed");
                        stats.failed += 1;
                    }
                }
            }
            return;
        }

        if let Err(e) = self
            .ledger
            .record(
                &self.config.provider_label,
                &translated.model,
                "translation.batch",
                translated.usage,
            )
            .await
        {
            warn!(error = %e, "Failed to record token usage");
        }

        // Split usage evenly across segments for the per-message cache rows.
        let per_message_tokens = translated.usage.total() / messages.len() as u32;
        for (message, segment) in messages.iter().zip(segments.iter()) {
            let usage = TokenUsage {
                prompt_tokens: 0,
                completion_tokens: per_message_tokens,
            };
            match self.apply_translation(message, segment, Some(usage)).await {
                Ok(()) => stats.translated += 1,
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Failed to record translation");
                    stats.failed += 1;
                }
            }
        }
    }

    async fn translate_single(
        &self,
        message: &Message,
        source: Option<&str>,
        target: &str,
    ) -> Result<()> {
        let translated = {
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| anyhow!("translation semaphore closed"))?;
            self.provider
                .translate(&message.original_text, source, target)
                .await?
        };

        if let Err(e) = self
            .ledger
            .record(
                &self.config.provider_label,
                &translated.model,
                "translation",
                translated.usage,
            )
            .await
        {
            warn!(error = %e, "Failed to record token usage");
        }

        self.apply_translation(message, &translated.text, Some(translated.usage))
            .await
    }

    /// Persist a successful translation and emit the notification.
    /// `usage` is None for cache hits (nothing new to cache or account).
    async fn apply_translation(
        &self,
        message: &Message,
        text: &str,
        usage: Option<TokenUsage>,
    ) -> Result<()> {
        let now = Utc::now();
        self.store.mark_translated(message.id, text, now).await?;

        if let Some(usage) = usage {
            if let Err(e) = self
                .cache
                .put(message.id, &message.target_language, text, usage.total())
                .await
            {
                warn!(message_id = %message.id, error = %e, "Translation cache write failed");
            }
        }

        // Fire-and-forget: a notification failure never fails the
        // translation itself.
        let payload = json!({
            "message_id": message.id,
            "channel_id": message.channel_id,
            "target_language": message.target_language,
            "translated_at": now,
        });
        if let Err(e) = self.notifier.publish("message.translated", payload).await {
            warn!(message_id = %message.id, error = %e, "Notification publish failed");
        }

        Ok(())
    }
}

/// Split a combined provider response back into per-segment outputs.
/// Exposed for tests; the scheduler uses the same rule internally.
pub fn split_segments(combined: &str) -> Vec<String> {
    combined
        .split(SEGMENT_TOKEN)
        .map(|s| s.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_preserves_order() {
        let combined = format!("hello\n{SEGMENT_TOKEN}\nbye");
        assert_eq!(split_segments(&combined), vec!["hello", "bye"]);
    }

    #[test]
    fn split_single_segment() {
        assert_eq!(split_segments("hello"), vec!["hello"]);
    }

    #[test]
    fn split_trims_whitespace_around_token() {
        let combined = format!("  first  \n{SEGMENT_TOKEN}\n  second  ");
        assert_eq!(split_segments(&combined), vec!["first", "second"]);
    }
}
