use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;

use bodylog_core::{
    BodyEntry, DocumentCategory, DocumentId, DocumentPatch, EntryFields, EntryId, MedDocument,
    NewDocument, NewEntry, UserId,
};
use bodylog_store::error::StoreError;
use bodylog_store::records::RecordStore;

use crate::config::PostgresConfig;
use crate::migrations;

const ENTRY_COLUMNS: &str = "id, user_id, date, weight, bp_systolic, bp_diastolic, \
     exercise_minutes, plank_minutes, knee_pain, notes, created_at";

const DOCUMENT_COLUMNS: &str = "id, user_id, doc_type, title, file_paths, created_at, updated_at";

type EntryRow = (
    String,
    String,
    NaiveDate,
    Option<f64>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    i32,
    Option<String>,
    DateTime<Utc>,
);

type DocumentRow = (
    String,
    String,
    String,
    Option<String>,
    Vec<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn entry_from_row(row: EntryRow) -> BodyEntry {
    let (
        id,
        user_id,
        date,
        weight,
        bp_systolic,
        bp_diastolic,
        exercise_minutes,
        plank_minutes,
        knee_pain,
        notes,
        created_at,
    ) = row;
    BodyEntry {
        id: EntryId::new(id),
        user_id: UserId::new(user_id),
        date,
        fields: EntryFields {
            weight,
            bp_systolic,
            bp_diastolic,
            exercise_minutes,
            plank_minutes,
            knee_pain,
            notes,
        },
        created_at,
    }
}

fn document_from_row(row: DocumentRow) -> Result<MedDocument, StoreError> {
    let (id, user_id, doc_type, title, file_paths, created_at, updated_at) = row;
    let category = doc_type
        .parse::<DocumentCategory>()
        .map_err(StoreError::Serialization)?;
    Ok(MedDocument {
        id: DocumentId::new(id),
        user_id: UserId::new(user_id),
        category,
        title,
        file_paths,
        created_at,
        updated_at,
    })
}

/// Map a `sqlx` error, surfacing unique-constraint violations as conflicts.
fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_owned())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StoreError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

/// PostgreSQL-backed implementation of [`RecordStore`].
///
/// Row identity is a text id generated on insert. `upsert_entry` is a single
/// `INSERT ... ON CONFLICT (user_id, date) DO UPDATE`, so concurrent writers
/// for the same day never produce a second row.
pub struct PostgresRecordStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresRecordStore {
    /// Connect to `PostgreSQL`, create the pool and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Create a store from an existing pool. Runs migrations on creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn list_entries(&self, owner: &UserId) -> Result<Vec<BodyEntry>, StoreError> {
        let table = self.config.entries_table();
        let query = format!(
            "SELECT {ENTRY_COLUMNS} FROM {table} \
             WHERE user_id = $1 ORDER BY date DESC, created_at DESC"
        );
        let rows: Vec<EntryRow> = sqlx::query_as(&query)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn find_entry(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Option<BodyEntry>, StoreError> {
        let table = self.config.entries_table();
        let query = format!("SELECT {ENTRY_COLUMNS} FROM {table} WHERE user_id = $1 AND date = $2");
        let row: Option<EntryRow> = sqlx::query_as(&query)
            .bind(owner.as_str())
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(entry_from_row))
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        let table = self.config.entries_table();
        let query = format!(
            "INSERT INTO {table} (id, user_id, date, weight, bp_systolic, bp_diastolic, \
             exercise_minutes, plank_minutes, knee_pain, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ENTRY_COLUMNS}"
        );
        let f = &entry.fields;
        let row: EntryRow = sqlx::query_as(&query)
            .bind(EntryId::generate().as_str())
            .bind(entry.user_id.as_str())
            .bind(entry.date)
            .bind(f.weight)
            .bind(f.bp_systolic)
            .bind(f.bp_diastolic)
            .bind(f.exercise_minutes)
            .bind(f.plank_minutes)
            .bind(f.knee_pain)
            .bind(f.notes.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!(user_id = %entry.user_id, date = %entry.date, "inserted entry");
        Ok(entry_from_row(row))
    }

    async fn update_entry(
        &self,
        owner: &UserId,
        id: &EntryId,
        fields: &EntryFields,
    ) -> Result<BodyEntry, StoreError> {
        let table = self.config.entries_table();
        let query = format!(
            "UPDATE {table} SET weight = $3, bp_systolic = $4, bp_diastolic = $5, \
             exercise_minutes = $6, plank_minutes = $7, knee_pain = $8, notes = $9 \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {ENTRY_COLUMNS}"
        );
        let row: Option<EntryRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .bind(owner.as_str())
            .bind(fields.weight)
            .bind(fields.bp_systolic)
            .bind(fields.bp_diastolic)
            .bind(fields.exercise_minutes)
            .bind(fields.plank_minutes)
            .bind(fields.knee_pain)
            .bind(fields.notes.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(entry_from_row)
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))
    }

    async fn upsert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        let table = self.config.entries_table();
        let query = format!(
            "INSERT INTO {table} (id, user_id, date, weight, bp_systolic, bp_diastolic, \
             exercise_minutes, plank_minutes, knee_pain, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (user_id, date) DO UPDATE \
             SET weight = EXCLUDED.weight, \
                 bp_systolic = EXCLUDED.bp_systolic, \
                 bp_diastolic = EXCLUDED.bp_diastolic, \
                 exercise_minutes = EXCLUDED.exercise_minutes, \
                 plank_minutes = EXCLUDED.plank_minutes, \
                 knee_pain = EXCLUDED.knee_pain, \
                 notes = EXCLUDED.notes \
             RETURNING {ENTRY_COLUMNS}"
        );
        let f = &entry.fields;
        let row: EntryRow = sqlx::query_as(&query)
            .bind(EntryId::generate().as_str())
            .bind(entry.user_id.as_str())
            .bind(entry.date)
            .bind(f.weight)
            .bind(f.bp_systolic)
            .bind(f.bp_diastolic)
            .bind(f.exercise_minutes)
            .bind(f.plank_minutes)
            .bind(f.knee_pain)
            .bind(f.notes.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!(user_id = %entry.user_id, date = %entry.date, "upserted entry");
        Ok(entry_from_row(row))
    }

    async fn delete_entry(&self, owner: &UserId, id: &EntryId) -> Result<bool, StoreError> {
        let table = self.config.entries_table();
        let query = format!("DELETE FROM {table} WHERE id = $1 AND user_id = $2");
        let result = sqlx::query(&query)
            .bind(id.as_str())
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_document(
        &self,
        owner: &UserId,
        category: DocumentCategory,
    ) -> Result<Option<MedDocument>, StoreError> {
        let table = self.config.documents_table();
        let query =
            format!("SELECT {DOCUMENT_COLUMNS} FROM {table} WHERE user_id = $1 AND doc_type = $2");
        let row: Option<DocumentRow> = sqlx::query_as(&query)
            .bind(owner.as_str())
            .bind(category.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(document_from_row).transpose()
    }

    async fn insert_document(&self, document: &NewDocument) -> Result<MedDocument, StoreError> {
        let table = self.config.documents_table();
        let query = format!(
            "INSERT INTO {table} (id, user_id, doc_type, title, file_paths) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row: DocumentRow = sqlx::query_as(&query)
            .bind(DocumentId::generate().as_str())
            .bind(document.user_id.as_str())
            .bind(document.category.as_str())
            .bind(document.title.as_deref())
            .bind(&document.file_paths)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!(user_id = %document.user_id, category = %document.category, "inserted document");
        document_from_row(row)
    }

    async fn update_document(
        &self,
        owner: &UserId,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<MedDocument, StoreError> {
        let table = self.config.documents_table();
        let query = format!(
            "UPDATE {table} SET title = COALESCE($3, title), \
             file_paths = COALESCE($4, file_paths), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row: Option<DocumentRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .bind(owner.as_str())
            .bind(patch.title.as_deref())
            .bind(patch.file_paths.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(document_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))
    }
}
