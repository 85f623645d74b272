//! Translation priority classification.
//!
//! Pure and total: every (text, languages, age) input maps to exactly one
//! tier. No I/O, no shared state; `now` is a parameter so tests control
//! the clock.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use pulsewire_common::TranslationPriority;

pub struct PriorityConfig {
    /// Content younger than this is high priority.
    pub high_hours: i64,
    /// Content younger than this (but past the high window) is normal.
    pub normal_hours: i64,
    url: Regex,
    tag_token: Regex,
}

impl PriorityConfig {
    pub fn new(high_hours: i64, normal_hours: i64) -> Self {
        Self {
            high_hours,
            normal_hours,
            url: Regex::new(r"^https?://\S+$").expect("url pattern is valid"),
            tag_token: Regex::new(r"^[#@]\w+$").expect("tag pattern is valid"),
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self::new(6, 72)
    }
}

/// Classify a message for translation. Rules apply in order, first match
/// wins:
///
/// 1. Source and target language both known and equal: `Skip`.
/// 2. Trivial content (bare URL, lone hashtag/mention, nothing
///    alphabetic): `Skip`. Translating these wastes provider calls.
/// 3. By age: younger than `high_hours` is `High`, younger than
///    `normal_hours` is `Normal`, older is `Low`. Unknown publish time
///    defaults to `Normal`.
pub fn classify(
    text: &str,
    source_lang: Option<&str>,
    target_lang: &str,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> TranslationPriority {
    if let Some(source) = source_lang {
        if source.eq_ignore_ascii_case(target_lang) {
            return TranslationPriority::Skip;
        }
    }

    if is_trivial(text, config) {
        return TranslationPriority::Skip;
    }

    match published_at {
        Some(published) => {
            let age = now - published;
            if age < Duration::hours(config.high_hours) {
                TranslationPriority::High
            } else if age < Duration::hours(config.normal_hours) {
                TranslationPriority::Normal
            } else {
                TranslationPriority::Low
            }
        }
        None => TranslationPriority::Normal,
    }
}

/// Content not worth a translation call: a bare URL, a lone
/// hashtag/mention token, or text with no alphabetic characters at all
/// (covers pure numbers, punctuation, and symbol runs).
fn is_trivial(text: &str, config: &PriorityConfig) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if config.url.is_match(trimmed) || config.tag_token.is_match(trimmed) {
        return true;
    }
    !trimmed.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PriorityConfig {
        PriorityConfig::default()
    }

    fn at_age(hours: i64) -> (Option<DateTime<Utc>>, DateTime<Utc>) {
        let now = Utc::now();
        (Some(now - Duration::hours(hours)), now)
    }

    #[test]
    fn same_language_skips() {
        let (published, now) = at_age(1);
        let p = classify("Breaking news from the front", Some("en"), "en", published, now, &config());
        assert_eq!(p, TranslationPriority::Skip);
    }

    #[test]
    fn same_language_case_insensitive() {
        let (published, now) = at_age(1);
        let p = classify("Nachrichten", Some("DE"), "de", published, now, &config());
        assert_eq!(p, TranslationPriority::Skip);
    }

    #[test]
    fn unknown_source_language_does_not_skip() {
        let (published, now) = at_age(1);
        let p = classify("Novosti dnya", None, "en", published, now, &config());
        assert_eq!(p, TranslationPriority::High);
    }

    #[test]
    fn bare_url_skips() {
        let (published, now) = at_age(1);
        let p = classify("https://example.com/post/123", None, "en", published, now, &config());
        assert_eq!(p, TranslationPriority::Skip);
    }

    #[test]
    fn lone_hashtag_skips() {
        let (published, now) = at_age(1);
        assert_eq!(
            classify("#breaking", None, "en", published, now, &config()),
            TranslationPriority::Skip
        );
        assert_eq!(
            classify("@channel_bot", None, "en", published, now, &config()),
            TranslationPriority::Skip
        );
    }

    #[test]
    fn pure_numbers_and_punctuation_skip() {
        let (published, now) = at_age(1);
        assert_eq!(
            classify("12345", None, "en", published, now, &config()),
            TranslationPriority::Skip
        );
        assert_eq!(
            classify("!!! ... ???", None, "en", published, now, &config()),
            TranslationPriority::Skip
        );
        assert_eq!(
            classify("   ", None, "en", published, now, &config()),
            TranslationPriority::Skip
        );
    }

    #[test]
    fn hashtag_inside_sentence_does_not_skip() {
        let (published, now) = at_age(1);
        let p = classify("Explosion reported #breaking", None, "en", published, now, &config());
        assert_eq!(p, TranslationPriority::High);
    }

    #[test]
    fn age_tiers() {
        let cfg = config();
        let (published, now) = at_age(2);
        assert_eq!(classify("text", None, "en", published, now, &cfg), TranslationPriority::High);

        let (published, now) = at_age(24);
        assert_eq!(classify("text", None, "en", published, now, &cfg), TranslationPriority::Normal);

        let (published, now) = at_age(100);
        assert_eq!(classify("text", None, "en", published, now, &cfg), TranslationPriority::Low);
    }

    #[test]
    fn tier_boundaries_are_exclusive() {
        let cfg = config();
        let (published, now) = at_age(6);
        assert_eq!(classify("text", None, "en", published, now, &cfg), TranslationPriority::Normal);

        let (published, now) = at_age(72);
        assert_eq!(classify("text", None, "en", published, now, &cfg), TranslationPriority::Low);
    }

    #[test]
    fn missing_published_at_defaults_to_normal() {
        let p = classify("text", None, "en", None, Utc::now(), &config());
        assert_eq!(p, TranslationPriority::Normal);
    }

    #[test]
    fn classification_is_deterministic() {
        let cfg = config();
        let now = Utc::now();
        let published = Some(now - Duration::hours(10));
        let a = classify("same input", Some("uk"), "en", published, now, &cfg);
        let b = classify("same input", Some("uk"), "en", published, now, &cfg);
        assert_eq!(a, b);
    }
}
