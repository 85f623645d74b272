//! End-to-end flow over in-memory backends: intake (classify + dedup)
//! followed by translation scheduling.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use pulsewire_common::{
    Message, MessageStore, MetricsSink, NotificationSink, TranslationCache, TranslationPriority,
    UsageLedger,
};
use pulsewire_engine::jobs::{intake_job, translation_job, IntakeConfig};
use pulsewire_engine::testing::{
    MemoryLedger, MemoryMessageStore, MemoryMetrics, MemoryNotifier, MemoryTranslationCache,
    StubEmbedder, UppercaseTranslator,
};
use pulsewire_engine::{
    DedupConfig, DedupEngine, PriorityConfig, TranslationScheduler, TranslatorConfig,
};
use pulsewire_index::MemoryVectorIndex;

#[tokio::test]
async fn intake_then_translate_full_flow() {
    let store = Arc::new(MemoryMessageStore::new());
    let store_dyn: Arc<dyn MessageStore> = store.clone();

    // Original report, a reworded copy from another channel, and a post
    // already in the target language.
    let mut original = Message::new(
        Uuid::new_v4(),
        "obstrel rayona prodolzhaetsya",
        "en",
        Some(Utc::now() - Duration::hours(4)),
    );
    original.source_language = Some("ru".to_string());

    let mut copy = Message::new(
        Uuid::new_v4(),
        "rayon snova pod obstrelom",
        "en",
        Some(Utc::now() - Duration::hours(1)),
    );
    copy.source_language = Some("ru".to_string());

    let mut english = Message::new(
        Uuid::new_v4(),
        "shelling of the district continues",
        "en",
        Some(Utc::now() - Duration::hours(1)),
    );
    english.source_language = Some("en".to_string());

    let original_id = original.id;
    let copy_id = copy.id;
    let english_id = english.id;

    store.insert(original);
    store.insert(copy);
    store.insert(english);

    // Embeddings: original and copy are near-duplicates, the english post
    // is unrelated in vector space.
    let embedder = StubEmbedder::new()
        .with("obstrel rayona prodolzhaetsya", vec![1.0, 0.0, 0.0])
        .with("rayon snova pod obstrelom", vec![0.95, 0.312_249_9, 0.0])
        .with("shelling of the district continues", vec![0.0, 0.0, 1.0]);

    let engine = DedupEngine::new(
        Arc::new(embedder),
        Arc::new(MemoryVectorIndex::new()),
        DedupConfig::default(),
    );

    let intake = intake_job(
        &store_dyn,
        &engine,
        &PriorityConfig::default(),
        &IntakeConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(intake.examined, 3);
    assert_eq!(intake.duplicates, 1);
    assert_eq!(intake.skipped, 1);
    assert_eq!(intake.queued_for_translation, 1);

    // The earlier message anchors the group; the copy is its duplicate
    // and drops off the translation queue.
    let anchor = store.get(original_id).unwrap();
    assert!(!anchor.is_duplicate);
    assert!(anchor.is_group_anchor());
    assert_eq!(anchor.duplicate_group_id, Some(original_id));
    assert!(anchor.needs_translation);
    assert_eq!(anchor.translation_priority, TranslationPriority::High);

    let duplicate = store.get(copy_id).unwrap();
    assert!(duplicate.is_duplicate);
    assert_eq!(duplicate.duplicate_group_id, Some(original_id));
    assert!(!duplicate.needs_translation);

    // Same-language content is classified skip at intake.
    let skipped = store.get(english_id).unwrap();
    assert_eq!(skipped.translation_priority, TranslationPriority::Skip);
    assert!(!skipped.needs_translation);

    // Translation pass: only the anchor is pending.
    let cache = Arc::new(MemoryTranslationCache::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let scheduler = TranslationScheduler::new(
        Arc::new(UppercaseTranslator),
        cache.clone() as Arc<dyn TranslationCache>,
        store_dyn.clone(),
        notifier.clone() as Arc<dyn NotificationSink>,
        Arc::new(MemoryLedger::new()) as Arc<dyn UsageLedger>,
        Arc::new(MemoryMetrics::new()) as Arc<dyn MetricsSink>,
        Arc::new(Semaphore::new(4)),
        TranslatorConfig::default(),
    );

    let run = translation_job(&scheduler).await.unwrap();
    assert_eq!(run.translated, 1);

    let translated = store.get(original_id).unwrap();
    assert_eq!(
        translated.translated_text.as_deref(),
        Some("OBSTREL RAYONA PRODOLZHAETSYA")
    );
    assert!(!translated.needs_translation);
    assert!(translated.translated_at.is_some());

    let untouched = store.get(copy_id).unwrap();
    assert!(untouched.translated_text.is_none());

    assert_eq!(notifier.events().len(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn intake_with_empty_store_is_a_no_op() {
    let store = Arc::new(MemoryMessageStore::new());
    let store_dyn: Arc<dyn MessageStore> = store.clone();
    let engine = DedupEngine::new(
        Arc::new(StubEmbedder::new()),
        Arc::new(MemoryVectorIndex::new()),
        DedupConfig::default(),
    );

    let stats = intake_job(
        &store_dyn,
        &engine,
        &PriorityConfig::default(),
        &IntakeConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(stats.examined, 0);
}
