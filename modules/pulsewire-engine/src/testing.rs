//! In-memory doubles for the boundary traits.
//!
//! Used by this crate's tests and, behind the `test-support` feature, by
//! downstream crates. None of these touch the network or disk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pulsewire_common::{
    DeadLetterEntry, DeadLetterStore, Message, MessageStore, MetricsSink, NotificationSink,
    TextEmbedder, TokenUsage, Translated, TranslationCache, TranslationPriority,
    TranslationProvider, UsageLedger,
};

// --- Embedder ---

/// Embedder with pre-registered text-to-vector mappings. Unregistered
/// text is an error, which doubles as a failure injector.
#[derive(Default)]
pub struct StubEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
        self
    }

    fn lookup(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no stub embedding registered for: {text}"))
    }
}

#[async_trait]
impl TextEmbedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.lookup(text)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.lookup(t)).collect()
    }
}

/// Index that reports itself unavailable. Dedup must fail open against it.
pub struct NotReadyIndex;

#[async_trait]
impl pulsewire_common::VectorIndex for NotReadyIndex {
    async fn is_ready(&self) -> bool {
        false
    }

    async fn upsert(
        &self,
        _id: &str,
        _vector: Vec<f32>,
        _meta: pulsewire_common::VectorMeta,
    ) -> Result<String> {
        Err(anyhow!("index unavailable"))
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _newer_than: Option<i64>,
    ) -> Result<Vec<pulsewire_common::VectorMatch>> {
        Err(anyhow!("index unavailable"))
    }
}

// --- Message store ---

#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<HashMap<Uuid, Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, message: Message) {
        self.messages.lock().unwrap().insert(message.id, message);
    }

    pub fn get(&self, id: Uuid) -> Option<Message> {
        self.messages.lock().unwrap().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn recent_unprocessed(&self, limit: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.embedding_id.is_none())
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.fetched_at);
        messages.truncate(limit);
        Ok(messages)
    }

    async fn pending_translations(&self, limit: usize) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .values()
            .filter(|m| {
                m.needs_translation && m.translation_priority != TranslationPriority::Skip
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.channel_id, m.translation_priority.rank(), m.fetched_at));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn update_dedup_fields(&self, message: &Message) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        let stored = messages
            .get_mut(&message.id)
            .ok_or_else(|| anyhow!("unknown message: {}", message.id))?;
        stored.is_duplicate = message.is_duplicate;
        stored.duplicate_group_id = message.duplicate_group_id;
        stored.originality_score = message.originality_score;
        stored.embedding_id = message.embedding_id.clone();
        Ok(())
    }

    async fn update_priority(
        &self,
        id: Uuid,
        priority: TranslationPriority,
        needs_translation: bool,
    ) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        let stored = messages
            .get_mut(&id)
            .ok_or_else(|| anyhow!("unknown message: {id}"))?;
        stored.translation_priority = priority;
        stored.needs_translation = needs_translation;
        Ok(())
    }

    async fn mark_translated(
        &self,
        id: Uuid,
        text: &str,
        translated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        let stored = messages
            .get_mut(&id)
            .ok_or_else(|| anyhow!("unknown message: {id}"))?;
        stored.translated_text = Some(text.to_string());
        stored.needs_translation = false;
        stored.translated_at = Some(translated_at);
        Ok(())
    }
}

// --- Translation providers ---

/// Uppercases whatever it is given. The segment token is already
/// uppercase, so combined batch requests survive intact.
pub struct UppercaseTranslator;

#[async_trait]
impl TranslationProvider for UppercaseTranslator {
    async fn translate(&self, text: &str, _: Option<&str>, _: &str) -> Result<Translated> {
        Ok(Translated {
            text: text.to_uppercase(),
            usage: TokenUsage {
                prompt_tokens: text.len() as u32,
                completion_tokens: text.len() as u32,
            },
            model: "stub-model".to_string(),
        })
    }
}

/// Always returns the same output, regardless of how many segments were
/// requested. Exercises the segment-count-mismatch fallback.
pub struct FixedTranslator {
    pub output: String,
}

#[async_trait]
impl TranslationProvider for FixedTranslator {
    async fn translate(&self, _: &str, _: Option<&str>, _: &str) -> Result<Translated> {
        Ok(Translated {
            text: self.output.clone(),
            usage: TokenUsage::default(),
            model: "stub-model".to_string(),
        })
    }
}

/// Always fails.
pub struct FailingTranslator;

#[async_trait]
impl TranslationProvider for FailingTranslator {
    async fn translate(&self, _: &str, _: Option<&str>, _: &str) -> Result<Translated> {
        Err(anyhow!("provider unavailable"))
    }
}

/// Counts concurrent in-flight calls so tests can assert the semaphore
/// bound. Holds each call open briefly to force overlap.
#[derive(Default)]
pub struct CountingTranslator {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl CountingTranslator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranslationProvider for CountingTranslator {
    async fn translate(&self, text: &str, _: Option<&str>, _: &str) -> Result<Translated> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Translated {
            text: text.to_string(),
            usage: TokenUsage::default(),
            model: "stub-model".to_string(),
        })
    }
}

// --- Cache, dead letters, ledger, notifier, metrics ---

#[derive(Default)]
pub struct MemoryTranslationCache {
    entries: Mutex<HashMap<(Uuid, String), String>>,
}

impl MemoryTranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, message_id: Uuid, lang: &str, text: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert((message_id, lang.to_string()), text.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranslationCache for MemoryTranslationCache {
    async fn get(&self, message_id: Uuid, lang: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(message_id, lang.to_string()))
            .cloned())
    }

    async fn put(&self, message_id: Uuid, lang: &str, text: &str, _token_count: u32) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert((message_id, lang.to_string()), text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDeadLetters {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl MemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetters {
    async fn insert(&self, job_name: &str, error: &str, trace: &str, attempts: u32) -> Result<()> {
        self.entries.lock().unwrap().push(DeadLetterEntry {
            job_name: job_name.to_string(),
            error: error.to_string(),
            trace: trace.to_string(),
            attempts,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<(String, String, String, TokenUsage)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, String, String, TokenUsage)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    async fn record(
        &self,
        provider: &str,
        model: &str,
        purpose: &str,
        usage: TokenUsage,
    ) -> Result<()> {
        self.entries.lock().unwrap().push((
            provider.to_string(),
            model.to_string(),
            purpose.to_string(),
            usage,
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<(String, serde_json::Value)>>,
    fail: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail, for best-effort tests.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn publish(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("notification sink offline"));
        }
        self.events
            .lock()
            .unwrap()
            .push((event_type.to_string(), payload));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMetrics {
    successes: Mutex<Vec<(String, Duration)>>,
    failures: Mutex<Vec<(String, Duration)>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> Vec<(String, Duration)> {
        self.successes.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(String, Duration)> {
        self.failures.lock().unwrap().clone()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl MetricsSink for MemoryMetrics {
    fn job_succeeded(&self, job_name: &str, duration: Duration) {
        self.successes
            .lock()
            .unwrap()
            .push((job_name.to_string(), duration));
    }

    fn job_failed(&self, job_name: &str, duration: Duration) {
        self.failures
            .lock()
            .unwrap()
            .push((job_name.to_string(), duration));
    }

    fn incr(&self, counter: &str) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(counter.to_string())
            .or_insert(0) += 1;
    }
}
