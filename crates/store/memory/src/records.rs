use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use bodylog_core::{
    BodyEntry, DocumentCategory, DocumentId, DocumentPatch, EntryFields, EntryId, MedDocument,
    NewDocument, NewEntry, UserId, sort_recent_first,
};
use bodylog_store::error::StoreError;
use bodylog_store::records::RecordStore;

type EntryKey = (UserId, NaiveDate);
type DocumentKey = (UserId, DocumentCategory);

/// In-memory [`RecordStore`] backed by [`DashMap`]s.
///
/// Entries are keyed by `(owner, date)` and documents by `(owner, category)`,
/// so the uniqueness invariants hold by construction and `upsert_entry` is
/// atomic. Lookups by id scan the owner's rows.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    entries: DashMap<EntryKey, BodyEntry>,
    documents: DashMap<DocumentKey, MedDocument>,
}

impl MemoryRecordStore {
    /// Create a new, empty in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all owners.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of documents across all owners.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn entry_key_by_id(&self, owner: &UserId, id: &EntryId) -> Option<EntryKey> {
        self.entries
            .iter()
            .find(|e| &e.key().0 == owner && &e.value().id == id)
            .map(|e| e.key().clone())
    }

    fn document_key_by_id(&self, owner: &UserId, id: &DocumentId) -> Option<DocumentKey> {
        self.documents
            .iter()
            .find(|d| &d.key().0 == owner && &d.value().id == id)
            .map(|d| d.key().clone())
    }

    fn materialize(entry: &NewEntry) -> BodyEntry {
        BodyEntry {
            id: EntryId::generate(),
            user_id: entry.user_id.clone(),
            date: entry.date,
            fields: entry.fields.clone(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_entries(&self, owner: &UserId) -> Result<Vec<BodyEntry>, StoreError> {
        let mut entries: Vec<BodyEntry> = self
            .entries
            .iter()
            .filter(|e| &e.key().0 == owner)
            .map(|e| e.value().clone())
            .collect();
        sort_recent_first(&mut entries);
        Ok(entries)
    }

    async fn find_entry(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Option<BodyEntry>, StoreError> {
        Ok(self
            .entries
            .get(&(owner.clone(), date))
            .map(|e| e.value().clone()))
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        match self.entries.entry((entry.user_id.clone(), entry.date)) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "entry for {} on {} already exists",
                entry.user_id, entry.date
            ))),
            Entry::Vacant(vacant) => {
                let stored = Self::materialize(entry);
                vacant.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn update_entry(
        &self,
        owner: &UserId,
        id: &EntryId,
        fields: &EntryFields,
    ) -> Result<BodyEntry, StoreError> {
        let key = self
            .entry_key_by_id(owner, id)
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))?;
        let mut stored = self
            .entries
            .get_mut(&key)
            .filter(|e| &e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))?;
        stored.fields = fields.clone();
        Ok(stored.clone())
    }

    async fn upsert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        let stored = match self.entries.entry((entry.user_id.clone(), entry.date)) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().fields = entry.fields.clone();
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => {
                let stored = Self::materialize(entry);
                vacant.insert(stored.clone());
                stored
            }
        };
        Ok(stored)
    }

    async fn delete_entry(&self, owner: &UserId, id: &EntryId) -> Result<bool, StoreError> {
        let Some(key) = self.entry_key_by_id(owner, id) else {
            return Ok(false);
        };
        Ok(self.entries.remove_if(&key, |_, e| &e.id == id).is_some())
    }

    async fn find_document(
        &self,
        owner: &UserId,
        category: DocumentCategory,
    ) -> Result<Option<MedDocument>, StoreError> {
        Ok(self
            .documents
            .get(&(owner.clone(), category))
            .map(|d| d.value().clone()))
    }

    async fn insert_document(&self, document: &NewDocument) -> Result<MedDocument, StoreError> {
        match self
            .documents
            .entry((document.user_id.clone(), document.category))
        {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "{} document for {} already exists",
                document.category, document.user_id
            ))),
            Entry::Vacant(vacant) => {
                let now = Utc::now();
                let stored = MedDocument {
                    id: DocumentId::generate(),
                    user_id: document.user_id.clone(),
                    category: document.category,
                    title: document.title.clone(),
                    file_paths: document.file_paths.clone(),
                    created_at: now,
                    updated_at: now,
                };
                vacant.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn update_document(
        &self,
        owner: &UserId,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<MedDocument, StoreError> {
        let key = self
            .document_key_by_id(owner, id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        let mut stored = self
            .documents
            .get_mut(&key)
            .filter(|d| &d.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        patch.apply(&mut stored);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use bodylog_store::testing::run_record_store_conformance_tests;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    #[tokio::test]
    async fn conformance() {
        let store = MemoryRecordStore::new();
        run_record_store_conformance_tests(&store)
            .await
            .expect("record store conformance tests should pass");
    }

    #[tokio::test]
    async fn default_upsert_path_matches_native() {
        // The trait's find-then-write default must agree with the native
        // atomic upsert for sequential writers.
        struct FindThenWrite(MemoryRecordStore);

        #[async_trait]
        impl RecordStore for FindThenWrite {
            async fn list_entries(&self, o: &UserId) -> Result<Vec<BodyEntry>, StoreError> {
                self.0.list_entries(o).await
            }
            async fn find_entry(
                &self,
                o: &UserId,
                d: NaiveDate,
            ) -> Result<Option<BodyEntry>, StoreError> {
                self.0.find_entry(o, d).await
            }
            async fn insert_entry(&self, e: &NewEntry) -> Result<BodyEntry, StoreError> {
                self.0.insert_entry(e).await
            }
            async fn update_entry(
                &self,
                o: &UserId,
                id: &EntryId,
                f: &EntryFields,
            ) -> Result<BodyEntry, StoreError> {
                self.0.update_entry(o, id, f).await
            }
            async fn delete_entry(&self, o: &UserId, id: &EntryId) -> Result<bool, StoreError> {
                self.0.delete_entry(o, id).await
            }
            async fn find_document(
                &self,
                o: &UserId,
                c: DocumentCategory,
            ) -> Result<Option<MedDocument>, StoreError> {
                self.0.find_document(o, c).await
            }
            async fn insert_document(&self, d: &NewDocument) -> Result<MedDocument, StoreError> {
                self.0.insert_document(d).await
            }
            async fn update_document(
                &self,
                o: &UserId,
                id: &DocumentId,
                p: &DocumentPatch,
            ) -> Result<MedDocument, StoreError> {
                self.0.update_document(o, id, p).await
            }
        }

        let store = FindThenWrite(MemoryRecordStore::new());
        run_record_store_conformance_tests(&store)
            .await
            .expect("find-then-write upsert should satisfy the suite");
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let store = MemoryRecordStore::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        store
            .insert_entry(&NewEntry::new(alice.clone(), day(1), EntryFields::default()))
            .await
            .unwrap();
        store
            .insert_entry(&NewEntry::new(bob.clone(), day(1), EntryFields::default()))
            .await
            .unwrap();

        assert_eq!(store.list_entries(&alice).await.unwrap().len(), 1);
        assert_eq!(store.list_entries(&bob).await.unwrap().len(), 1);
        assert_eq!(store.entry_count(), 2);
    }

    #[tokio::test]
    async fn update_document_bumps_updated_at() {
        let store = MemoryRecordStore::new();
        let owner = UserId::new("u");
        let doc = store
            .insert_document(&NewDocument::empty(
                owner.clone(),
                DocumentCategory::RxSupplements,
            ))
            .await
            .unwrap();
        let updated = store
            .update_document(&owner, &doc.id, &DocumentPatch::paths(vec!["p".into()]))
            .await
            .unwrap();
        assert!(updated.updated_at >= doc.updated_at);
        assert_eq!(updated.created_at, doc.created_at);
        assert_eq!(store.document_count(), 1);
    }
}
