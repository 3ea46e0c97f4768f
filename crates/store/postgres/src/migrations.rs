use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// The unique constraints on `(user_id, date)` and `(user_id, doc_type)` are
/// what the record store relies on for its upsert and conflict reporting.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let entries_table = config.entries_table();
    let documents_table = config.documents_table();

    let create_entries = format!(
        "CREATE TABLE IF NOT EXISTS {entries_table} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            date DATE NOT NULL,
            weight DOUBLE PRECISION,
            bp_systolic INTEGER,
            bp_diastolic INTEGER,
            exercise_minutes INTEGER,
            plank_minutes INTEGER,
            knee_pain INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, date)
        )"
    );

    let create_documents = format!(
        "CREATE TABLE IF NOT EXISTS {documents_table} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            title TEXT,
            file_paths TEXT[] NOT NULL DEFAULT '{{}}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (user_id, doc_type)
        )"
    );

    sqlx::query(&create_entries).execute(pool).await?;
    sqlx::query(&create_documents).execute(pool).await?;

    Ok(())
}
