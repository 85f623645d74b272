use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Translation priority ---

/// Scheduling tier for translation work. `High` drains before `Normal`
/// before `Low`; `Skip` is never enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationPriority {
    Skip,
    Low,
    Normal,
    High,
}

impl TranslationPriority {
    /// Stable string encoding used by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationPriority::Skip => "skip",
            TranslationPriority::Normal => "normal",
            TranslationPriority::Low => "low",
            TranslationPriority::High => "high",
        }
    }

    /// Drain order for scheduling queries: lower ranks first.
    pub fn rank(&self) -> i32 {
        match self {
            TranslationPriority::High => 0,
            TranslationPriority::Normal => 1,
            TranslationPriority::Low => 2,
            TranslationPriority::Skip => 3,
        }
    }
}

impl std::str::FromStr for TranslationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(TranslationPriority::Skip),
            "low" => Ok(TranslationPriority::Low),
            "normal" => Ok(TranslationPriority::Normal),
            "high" => Ok(TranslationPriority::High),
            other => Err(format!("unknown translation priority: {other}")),
        }
    }
}

impl std::fmt::Display for TranslationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Message ---

/// A unit of ingested channel content.
///
/// Dedup fields (`is_duplicate`, `duplicate_group_id`, `originality_score`,
/// `embedding_id`) are owned by the dedup engine; translation fields
/// (`translated_text`, `needs_translation`, `translated_at`) by the
/// translation scheduler. Everything else is set at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub original_text: String,
    pub translated_text: Option<String>,
    /// None until language detection has run on the original text.
    pub source_language: Option<String>,
    pub target_language: String,
    pub needs_translation: bool,
    pub translation_priority: TranslationPriority,
    pub is_duplicate: bool,
    /// Shared by all messages considered the same underlying event. The
    /// anchor message has `duplicate_group_id == Some(id)` and
    /// `is_duplicate == false`; every other member points at the anchor.
    pub duplicate_group_id: Option<Uuid>,
    /// 0-100 inverse of best-match similarity. 100 = fully original.
    pub originality_score: i32,
    /// Key into the vector index, set lazily on the first dedup pass.
    pub embedding_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub translated_at: Option<DateTime<Utc>>,
}

impl Message {
    /// New message as the ingestion connector hands it over.
    pub fn new(
        channel_id: Uuid,
        original_text: impl Into<String>,
        target_language: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            original_text: original_text.into(),
            translated_text: None,
            source_language: None,
            target_language: target_language.into(),
            needs_translation: true,
            translation_priority: TranslationPriority::Normal,
            is_duplicate: false,
            duplicate_group_id: None,
            originality_score: 100,
            embedding_id: None,
            published_at,
            fetched_at: Utc::now(),
            translated_at: None,
        }
    }

    /// Timestamp used for dedup ordering: publish time when the source
    /// provided one, fetch time otherwise.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.fetched_at)
    }

    /// Text the dedup engine embeds: the translation when present (so
    /// cross-language duplicates land in one embedding space), the
    /// original otherwise.
    pub fn dedup_text(&self) -> &str {
        match &self.translated_text {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.original_text,
        }
    }

    /// True when this message anchors its duplicate group.
    pub fn is_group_anchor(&self) -> bool {
        self.duplicate_group_id == Some(self.id)
    }
}

// --- Dead letters ---

/// Record of a background job that exhausted its retry budget. Written
/// once by the retry wrapper, never mutated, kept for operator triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job_name: String,
    pub error: String,
    /// Full error chain, the closest thing to a stack trace anyhow gives us.
    pub trace: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

// --- Token accounting ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A completed provider translation: output text plus what it cost.
#[derive(Debug, Clone)]
pub struct Translated {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

// --- Vector index records ---

/// Closed metadata record stored alongside each vector. Only these fields
/// are read by the query path, so no open map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VectorMeta {
    pub message_id: Uuid,
    pub channel_id: Uuid,
    /// Publish time as epoch seconds, when the source provided one.
    pub published_at_ts: Option<i64>,
}

/// One nearest-neighbor hit. Scores are normalized 0-1, higher is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_round_trips_through_str() {
        for p in [
            TranslationPriority::Skip,
            TranslationPriority::Low,
            TranslationPriority::Normal,
            TranslationPriority::High,
        ] {
            assert_eq!(p.as_str().parse::<TranslationPriority>().unwrap(), p);
        }
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(TranslationPriority::High.rank() < TranslationPriority::Normal.rank());
        assert!(TranslationPriority::Normal.rank() < TranslationPriority::Low.rank());
        assert!(TranslationPriority::Low.rank() < TranslationPriority::Skip.rank());
    }

    #[test]
    fn effective_timestamp_prefers_published_at() {
        let channel = Uuid::new_v4();
        let published = Utc::now() - chrono::Duration::hours(3);
        let msg = Message::new(channel, "hello", "en", Some(published));
        assert_eq!(msg.effective_timestamp(), published);

        let msg = Message::new(channel, "hello", "en", None);
        assert_eq!(msg.effective_timestamp(), msg.fetched_at);
    }

    #[test]
    fn dedup_text_prefers_translation() {
        let mut msg = Message::new(Uuid::new_v4(), "hola", "en", None);
        assert_eq!(msg.dedup_text(), "hola");
        msg.translated_text = Some("hello".to_string());
        assert_eq!(msg.dedup_text(), "hello");
        msg.translated_text = Some("   ".to_string());
        assert_eq!(msg.dedup_text(), "hola");
    }
}
