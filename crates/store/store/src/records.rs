use async_trait::async_trait;
use chrono::NaiveDate;

use bodylog_core::{
    BodyEntry, DocumentCategory, DocumentId, DocumentPatch, EntryFields, EntryId, MedDocument,
    NewDocument, NewEntry, UserId,
};

use crate::error::StoreError;

/// Trait for the remote record store holding body entries and photo documents.
///
/// Every operation is scoped by the owning user: an id belonging to another
/// user behaves exactly like a missing id. Implementations must be
/// `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All entries of `owner`, newest date first, then newest creation first.
    async fn list_entries(&self, owner: &UserId) -> Result<Vec<BodyEntry>, StoreError>;

    /// The entry of `owner` on `date`, if any.
    async fn find_entry(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Option<BodyEntry>, StoreError>;

    /// Insert a new entry.
    ///
    /// Returns [`StoreError::Conflict`] if `owner` already has an entry on
    /// that date.
    async fn insert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError>;

    /// Overwrite the measurement fields of an existing entry. The date and
    /// creation time are unchanged.
    ///
    /// Returns [`StoreError::NotFound`] if no such entry belongs to `owner`.
    async fn update_entry(
        &self,
        owner: &UserId,
        id: &EntryId,
        fields: &EntryFields,
    ) -> Result<BodyEntry, StoreError>;

    /// Insert or update keyed on `(user_id, date)`.
    ///
    /// The default implementation looks the key up and then updates or
    /// inserts, which is two round trips and not atomic. Backends with a
    /// native upsert should override it.
    async fn upsert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        match self.find_entry(&entry.user_id, entry.date).await? {
            Some(existing) => {
                self.update_entry(&entry.user_id, &existing.id, &entry.fields)
                    .await
            }
            None => self.insert_entry(entry).await,
        }
    }

    /// Delete an entry. Returns `true` if it existed and belonged to `owner`.
    async fn delete_entry(&self, owner: &UserId, id: &EntryId) -> Result<bool, StoreError>;

    /// The document of `owner` in `category`, if any.
    async fn find_document(
        &self,
        owner: &UserId,
        category: DocumentCategory,
    ) -> Result<Option<MedDocument>, StoreError>;

    /// Create a document.
    ///
    /// Returns [`StoreError::Conflict`] if `owner` already has a document in
    /// that category.
    async fn insert_document(&self, document: &NewDocument) -> Result<MedDocument, StoreError>;

    /// Apply `patch` to a document and return the updated row.
    ///
    /// Returns [`StoreError::NotFound`] if no such document belongs to `owner`.
    async fn update_document(
        &self,
        owner: &UserId,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<MedDocument, StoreError>;
}
