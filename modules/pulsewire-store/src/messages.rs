use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pulsewire_common::{Message, MessageStore, TranslationPriority};

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly ingested message. Used by the ingestion boundary
    /// and by operational backfills.
    pub async fn insert(&self, message: &Message) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (
                id, channel_id, original_text, translated_text, source_language,
                target_language, needs_translation, translation_priority,
                is_duplicate, duplicate_group_id, originality_score, embedding_id,
                published_at, fetched_at, translated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING",
        )
        .bind(message.id)
        .bind(message.channel_id)
        .bind(&message.original_text)
        .bind(&message.translated_text)
        .bind(&message.source_language)
        .bind(&message.target_language)
        .bind(message.needs_translation)
        .bind(message.translation_priority.as_str())
        .bind(message.is_duplicate)
        .bind(message.duplicate_group_id)
        .bind(message.originality_score)
        .bind(&message.embedding_id)
        .bind(message.published_at)
        .bind(message.fetched_at)
        .bind(message.translated_at)
        .execute(&self.pool)
        .await
        .context("insert message")?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    channel_id: Uuid,
    original_text: String,
    translated_text: Option<String>,
    source_language: Option<String>,
    target_language: String,
    needs_translation: bool,
    translation_priority: String,
    is_duplicate: bool,
    duplicate_group_id: Option<Uuid>,
    originality_score: i32,
    embedding_id: Option<String>,
    published_at: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
    translated_at: Option<DateTime<Utc>>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            original_text: self.original_text,
            translated_text: self.translated_text,
            source_language: self.source_language,
            target_language: self.target_language,
            needs_translation: self.needs_translation,
            // Unknown values mean operator tampering; treat as normal
            // rather than dropping the row.
            translation_priority: self
                .translation_priority
                .parse()
                .unwrap_or(TranslationPriority::Normal),
            is_duplicate: self.is_duplicate,
            duplicate_group_id: self.duplicate_group_id,
            originality_score: self.originality_score,
            embedding_id: self.embedding_id,
            published_at: self.published_at,
            fetched_at: self.fetched_at,
            translated_at: self.translated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, channel_id, original_text, translated_text, source_language,
    target_language, needs_translation, translation_priority, is_duplicate,
    duplicate_group_id, originality_score, embedding_id, published_at, fetched_at, translated_at";

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn recent_unprocessed(&self, limit: usize) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE embedding_id IS NULL
             ORDER BY fetched_at ASC
             LIMIT $1",
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("fetch unprocessed messages")?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn pending_translations(&self, limit: usize) -> Result<Vec<Message>> {
        // High drains before normal before low; skip is never selected.
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE needs_translation AND translation_priority <> 'skip'
             ORDER BY channel_id,
                 CASE translation_priority
                     WHEN 'high' THEN 0
                     WHEN 'normal' THEN 1
                     WHEN 'low' THEN 2
                     ELSE 3
                 END,
                 fetched_at ASC
             LIMIT $1",
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("fetch pending translations")?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn update_dedup_fields(&self, message: &Message) -> Result<()> {
        sqlx::query(
            "UPDATE messages
             SET is_duplicate = $2, duplicate_group_id = $3,
                 originality_score = $4, embedding_id = $5
             WHERE id = $1",
        )
        .bind(message.id)
        .bind(message.is_duplicate)
        .bind(message.duplicate_group_id)
        .bind(message.originality_score)
        .bind(&message.embedding_id)
        .execute(&self.pool)
        .await
        .context("update dedup fields")?;
        Ok(())
    }

    async fn update_priority(
        &self,
        id: Uuid,
        priority: TranslationPriority,
        needs_translation: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE messages SET translation_priority = $2, needs_translation = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(priority.as_str())
        .bind(needs_translation)
        .execute(&self.pool)
        .await
        .context("update translation priority")?;
        Ok(())
    }

    async fn mark_translated(
        &self,
        id: Uuid,
        text: &str,
        translated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE messages
             SET translated_text = $2, needs_translation = FALSE, translated_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(text)
        .bind(translated_at)
        .execute(&self.pool)
        .await
        .context("mark message translated")?;
        Ok(())
    }
}
