use sqlx::PgPool;
use tracing::info;

/// Run idempotent schema migrations. Safe to call on every startup.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running schema migrations...");

    let statements = [
        "CREATE TABLE IF NOT EXISTS messages (
            id UUID PRIMARY KEY,
            channel_id UUID NOT NULL,
            original_text TEXT NOT NULL,
            translated_text TEXT,
            source_language TEXT,
            target_language TEXT NOT NULL,
            needs_translation BOOLEAN NOT NULL DEFAULT TRUE,
            translation_priority TEXT NOT NULL DEFAULT 'normal',
            is_duplicate BOOLEAN NOT NULL DEFAULT FALSE,
            duplicate_group_id UUID,
            originality_score INTEGER NOT NULL DEFAULT 100,
            embedding_id TEXT,
            published_at TIMESTAMPTZ,
            fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            translated_at TIMESTAMPTZ
        )",
        // Scheduling query: channel, then priority rank.
        "CREATE INDEX IF NOT EXISTS idx_messages_pending_translation
            ON messages (channel_id, translation_priority)
            WHERE needs_translation AND translation_priority <> 'skip'",
        "CREATE INDEX IF NOT EXISTS idx_messages_unprocessed
            ON messages (fetched_at)
            WHERE embedding_id IS NULL",
        "CREATE INDEX IF NOT EXISTS idx_messages_duplicate_group
            ON messages (duplicate_group_id)",
        "CREATE TABLE IF NOT EXISTS translation_cache (
            message_id UUID NOT NULL,
            lang TEXT NOT NULL,
            translated_text TEXT NOT NULL,
            token_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (message_id, lang)
        )",
        "CREATE TABLE IF NOT EXISTS dead_letters (
            id BIGSERIAL PRIMARY KEY,
            job_name TEXT NOT NULL,
            error TEXT NOT NULL,
            trace TEXT NOT NULL,
            attempts INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        "CREATE TABLE IF NOT EXISTS usage_ledger (
            id BIGSERIAL PRIMARY KEY,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            purpose TEXT NOT NULL,
            prompt_tokens INTEGER NOT NULL,
            completion_tokens INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        "CREATE TABLE IF NOT EXISTS embedding_cache (
            input_hash TEXT PRIMARY KEY,
            model_version TEXT NOT NULL,
            embedding REAL[] NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Schema migrations complete");
    Ok(())
}
