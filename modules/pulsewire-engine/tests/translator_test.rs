//! Translation scheduler scenarios: batching, fallback, cache, semaphore.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use pulsewire_common::{
    Message, MessageStore, MetricsSink, NotificationSink, TranslationCache, TranslationPriority,
    TranslationProvider, UsageLedger,
};
use pulsewire_engine::testing::{
    CountingTranslator, FailingTranslator, FixedTranslator, MemoryLedger, MemoryMessageStore,
    MemoryMetrics, MemoryNotifier, MemoryTranslationCache, UppercaseTranslator,
};
use pulsewire_engine::{TranslationScheduler, TranslatorConfig};

struct Fixture {
    store: Arc<MemoryMessageStore>,
    cache: Arc<MemoryTranslationCache>,
    notifier: Arc<MemoryNotifier>,
    ledger: Arc<MemoryLedger>,
    metrics: Arc<MemoryMetrics>,
    semaphore: Arc<Semaphore>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryMessageStore::new()),
            cache: Arc::new(MemoryTranslationCache::new()),
            notifier: Arc::new(MemoryNotifier::new()),
            ledger: Arc::new(MemoryLedger::new()),
            metrics: Arc::new(MemoryMetrics::new()),
            semaphore: Arc::new(Semaphore::new(12)),
        }
    }

    fn scheduler(
        &self,
        provider: Arc<dyn TranslationProvider>,
        config: TranslatorConfig,
    ) -> TranslationScheduler {
        TranslationScheduler::new(
            provider,
            self.cache.clone() as Arc<dyn TranslationCache>,
            self.store.clone() as Arc<dyn MessageStore>,
            self.notifier.clone() as Arc<dyn NotificationSink>,
            self.ledger.clone() as Arc<dyn UsageLedger>,
            self.metrics.clone() as Arc<dyn MetricsSink>,
            self.semaphore.clone(),
            config,
        )
    }

    fn pending_message(&self, text: &str, source: &str) -> Uuid {
        let mut msg = Message::new(Uuid::new_v4(), text, "en", Some(Utc::now()));
        msg.source_language = Some(source.to_string());
        msg.translation_priority = TranslationPriority::Normal;
        let id = msg.id;
        self.store.insert(msg);
        id
    }
}

#[tokio::test]
async fn batch_translation_splits_segments_in_order() {
    let fixture = Fixture::new();
    let hola = fixture.pending_message("hola", "es");
    let adios = fixture.pending_message("adios", "es");

    let scheduler = fixture.scheduler(Arc::new(UppercaseTranslator), TranslatorConfig::default());
    let stats = scheduler.process_pending().await.unwrap();

    assert_eq!(stats.translated, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.batch_fallbacks, 0);

    let first = fixture.store.get(hola).unwrap();
    let second = fixture.store.get(adios).unwrap();
    assert_eq!(first.translated_text.as_deref(), Some("HOLA"));
    assert_eq!(second.translated_text.as_deref(), Some("ADIOS"));
    assert!(!first.needs_translation);
    assert!(first.translated_at.is_some());
}

#[tokio::test]
async fn segment_mismatch_falls_back_to_sequential() {
    let fixture = Fixture::new();
    let a = fixture.pending_message("pervoe soobshchenie", "ru");
    let b = fixture.pending_message("vtoroe soobshchenie", "ru");
    let c = fixture.pending_message("tretye soobshchenie", "ru");

    // One segment back no matter how many went in.
    let provider = Arc::new(FixedTranslator {
        output: "collapsed output".to_string(),
    });
    let scheduler = fixture.scheduler(provider, TranslatorConfig::default());
    let stats = scheduler.process_pending().await.unwrap();

    assert_eq!(stats.batch_fallbacks, 1);
    assert_eq!(stats.translated, 3, "every input retranslated individually");
    for id in [a, b, c] {
        let msg = fixture.store.get(id).unwrap();
        assert_eq!(msg.translated_text.as_deref(), Some("collapsed output"));
        assert!(!msg.needs_translation);
    }
}

#[tokio::test]
async fn cache_hit_short_circuits_provider() {
    let fixture = Fixture::new();
    let id = fixture.pending_message("staraya novost", "ru");
    fixture.cache.seed(id, "en", "old news");

    let provider = Arc::new(CountingTranslator::new());
    let scheduler = fixture.scheduler(provider.clone(), TranslatorConfig::default());
    let stats = scheduler.process_pending().await.unwrap();

    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.translated, 0);
    assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(fixture.metrics.counter("translation.cache_hit"), 1);

    let msg = fixture.store.get(id).unwrap();
    assert_eq!(msg.translated_text.as_deref(), Some("old news"));
    assert!(!msg.needs_translation);
}

#[tokio::test]
async fn cache_miss_populates_cache() {
    let fixture = Fixture::new();
    let id = fixture.pending_message("novost", "ru");

    let scheduler = fixture.scheduler(Arc::new(UppercaseTranslator), TranslatorConfig::default());
    scheduler.process_pending().await.unwrap();

    assert_eq!(fixture.metrics.counter("translation.cache_miss"), 1);
    let cached = fixture.cache.get(id, "en").await.unwrap();
    assert_eq!(cached.as_deref(), Some("NOVOST"));
}

#[tokio::test]
async fn provider_outage_keeps_messages_pending_and_errors() {
    let fixture = Fixture::new();
    fixture.pending_message("odna", "ru");
    fixture.pending_message("dve", "ru");

    let scheduler = fixture.scheduler(Arc::new(FailingTranslator), TranslatorConfig::default());
    let result = scheduler.process_pending().await;

    assert!(result.is_err(), "a run where everything failed must error");
    for msg in fixture.store.all() {
        assert!(msg.needs_translation, "failed messages stay pending");
        assert!(msg.translated_text.is_none());
    }
}

#[tokio::test]
async fn notification_failure_does_not_fail_translation() {
    let fixture = Fixture::new();
    let id = fixture.pending_message("vazhno", "ru");
    fixture.notifier.set_failing(true);

    let scheduler = fixture.scheduler(Arc::new(UppercaseTranslator), TranslatorConfig::default());
    let stats = scheduler.process_pending().await.unwrap();

    assert_eq!(stats.translated, 1);
    let msg = fixture.store.get(id).unwrap();
    assert!(!msg.needs_translation);
    assert!(fixture.notifier.events().is_empty());
}

#[tokio::test]
async fn successful_translation_publishes_event_and_records_usage() {
    let fixture = Fixture::new();
    fixture.pending_message("soobshchenie", "ru");

    let scheduler = fixture.scheduler(Arc::new(UppercaseTranslator), TranslatorConfig::default());
    scheduler.process_pending().await.unwrap();

    let events = fixture.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "message.translated");

    let ledger = fixture.ledger.entries();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].2, "translation");
    assert!(ledger[0].3.total() > 0);
}

#[tokio::test]
async fn high_priority_drains_before_low() {
    let fixture = Fixture::new();
    let channel = Uuid::new_v4();

    let mut low = Message::new(channel, "staroe", "en", Some(Utc::now()));
    low.source_language = Some("ru".to_string());
    low.translation_priority = TranslationPriority::Low;
    let mut high = Message::new(channel, "srochnoe", "en", Some(Utc::now()));
    high.source_language = Some("ru".to_string());
    high.translation_priority = TranslationPriority::High;
    fixture.store.insert(low);
    fixture.store.insert(high);

    let page = fixture.store.pending_translations(1).await.unwrap();
    assert_eq!(page[0].original_text, "srochnoe");
}

#[tokio::test]
async fn skip_priority_is_never_scheduled() {
    let fixture = Fixture::new();
    let mut msg = Message::new(Uuid::new_v4(), "already english", "en", Some(Utc::now()));
    msg.translation_priority = TranslationPriority::Skip;
    fixture.store.insert(msg);

    let page = fixture.store.pending_translations(10).await.unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn concurrent_runs_respect_semaphore_bound() {
    let fixture = Fixture::new();
    let semaphore = Arc::new(Semaphore::new(2));

    // Distinct source languages: every message becomes its own group, so
    // each one is a separate provider call.
    for i in 0..8 {
        let mut msg = Message::new(Uuid::new_v4(), format!("text {i}"), "en", Some(Utc::now()));
        msg.source_language = Some(format!("l{i}"));
        fixture.store.insert(msg);
    }

    let provider = Arc::new(CountingTranslator::new());
    let scheduler = Arc::new(TranslationScheduler::new(
        provider.clone(),
        fixture.cache.clone() as Arc<dyn TranslationCache>,
        fixture.store.clone() as Arc<dyn MessageStore>,
        fixture.notifier.clone() as Arc<dyn NotificationSink>,
        fixture.ledger.clone() as Arc<dyn UsageLedger>,
        fixture.metrics.clone() as Arc<dyn MetricsSink>,
        semaphore,
        TranslatorConfig::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            let _ = scheduler.process_pending().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let max = provider.max_in_flight.load(std::sync::atomic::Ordering::SeqCst);
    assert!(max <= 2, "semaphore bound exceeded: {max} in flight");
    assert!(provider.calls.load(std::sync::atomic::Ordering::SeqCst) >= 8);
}
