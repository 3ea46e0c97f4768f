//! Store wrappers that inject delays and failures into the memory backends.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use tokio::sync::Notify;

use bodylog_core::{
    BodyEntry, DocumentCategory, DocumentId, DocumentPatch, EntryFields, EntryId, MedDocument,
    NewDocument, NewEntry, UserId,
};
use bodylog_store::{ObjectStorage, RecordStore, StorageError, StoreError};
use bodylog_store_memory::{MemoryObjectStorage, MemoryRecordStore};

/// Record store whose first `list_entries` call captures its result, then
/// parks until released, so a later load can overtake it.
#[derive(Default)]
pub struct ScriptedRecords {
    pub inner: MemoryRecordStore,
    hold_first_list: AtomicBool,
    list_calls: AtomicUsize,
    pub first_list_started: Notify,
    pub release_first_list: Notify,
    pub fail_document_updates: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub document_inserts: AtomicUsize,
    pub hold_upserts: AtomicBool,
    pub upsert_started: Notify,
    pub release_upsert: Notify,
}

impl ScriptedRecords {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn holding_first_list() -> Arc<Self> {
        let store = Self::default();
        store.hold_first_list.store(true, Ordering::SeqCst);
        Arc::new(store)
    }
}

#[async_trait]
impl RecordStore for ScriptedRecords {
    async fn list_entries(&self, owner: &UserId) -> Result<Vec<BodyEntry>, StoreError> {
        let result = self.inner.list_entries(owner).await;
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 && self.hold_first_list.load(Ordering::SeqCst) {
            self.first_list_started.notify_one();
            self.release_first_list.notified().await;
        }
        result
    }

    async fn find_entry(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Option<BodyEntry>, StoreError> {
        self.inner.find_entry(owner, date).await
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        self.inner.insert_entry(entry).await
    }

    async fn update_entry(
        &self,
        owner: &UserId,
        id: &EntryId,
        fields: &EntryFields,
    ) -> Result<BodyEntry, StoreError> {
        self.inner.update_entry(owner, id, fields).await
    }

    async fn upsert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        if self.hold_upserts.load(Ordering::SeqCst) {
            self.upsert_started.notify_one();
            self.release_upsert.notified().await;
        }
        self.inner.upsert_entry(entry).await
    }

    async fn delete_entry(&self, owner: &UserId, id: &EntryId) -> Result<bool, StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete rejected".into()));
        }
        self.inner.delete_entry(owner, id).await
    }

    async fn find_document(
        &self,
        owner: &UserId,
        category: DocumentCategory,
    ) -> Result<Option<MedDocument>, StoreError> {
        self.inner.find_document(owner, category).await
    }

    async fn insert_document(&self, document: &NewDocument) -> Result<MedDocument, StoreError> {
        self.document_inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_document(document).await
    }

    async fn update_document(
        &self,
        owner: &UserId,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<MedDocument, StoreError> {
        if self.fail_document_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("update rejected".into()));
        }
        self.inner.update_document(owner, id, patch).await
    }
}

/// Record store that loses every `find_document` race: the first lookup
/// reports no document even though another client already created one.
pub struct RacingDocuments {
    pub inner: MemoryRecordStore,
    first_find: AtomicBool,
}

impl RacingDocuments {
    pub fn new(inner: MemoryRecordStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            first_find: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl RecordStore for RacingDocuments {
    async fn list_entries(&self, owner: &UserId) -> Result<Vec<BodyEntry>, StoreError> {
        self.inner.list_entries(owner).await
    }

    async fn find_entry(
        &self,
        owner: &UserId,
        date: NaiveDate,
    ) -> Result<Option<BodyEntry>, StoreError> {
        self.inner.find_entry(owner, date).await
    }

    async fn insert_entry(&self, entry: &NewEntry) -> Result<BodyEntry, StoreError> {
        self.inner.insert_entry(entry).await
    }

    async fn update_entry(
        &self,
        owner: &UserId,
        id: &EntryId,
        fields: &EntryFields,
    ) -> Result<BodyEntry, StoreError> {
        self.inner.update_entry(owner, id, fields).await
    }

    async fn delete_entry(&self, owner: &UserId, id: &EntryId) -> Result<bool, StoreError> {
        self.inner.delete_entry(owner, id).await
    }

    async fn find_document(
        &self,
        owner: &UserId,
        category: DocumentCategory,
    ) -> Result<Option<MedDocument>, StoreError> {
        if self.first_find.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_document(owner, category).await
    }

    async fn insert_document(&self, document: &NewDocument) -> Result<MedDocument, StoreError> {
        self.inner.insert_document(document).await
    }

    async fn update_document(
        &self,
        owner: &UserId,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> Result<MedDocument, StoreError> {
        self.inner.update_document(owner, id, patch).await
    }
}

/// Object storage that rejects uploads whose path contains a marker, and
/// optionally every delete or signing request. Uploads matching the hold
/// marker park after writing until released.
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryObjectStorage,
    pub fail_uploads_containing: std::sync::Mutex<Option<String>>,
    pub hold_uploads_containing: std::sync::Mutex<Option<String>>,
    pub upload_held: Notify,
    pub release_upload: Notify,
    pub fail_deletes: AtomicBool,
    pub fail_signing_containing: std::sync::Mutex<Option<String>>,
}

impl FlakyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_uploads(marker: &str) -> Arc<Self> {
        let storage = Self::default();
        *storage.fail_uploads_containing.lock().unwrap() = Some(marker.to_owned());
        Arc::new(storage)
    }

    pub fn holding_uploads(marker: &str) -> Arc<Self> {
        let storage = Self::default();
        *storage.hold_uploads_containing.lock().unwrap() = Some(marker.to_owned());
        Arc::new(storage)
    }

    fn matches(slot: &std::sync::Mutex<Option<String>>, path: &str) -> bool {
        slot.lock()
            .unwrap()
            .as_deref()
            .is_some_and(|marker| path.contains(marker))
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StorageError> {
        if Self::matches(&self.fail_uploads_containing, path) {
            return Err(StorageError::Storage(format!("upload of {path} refused")));
        }
        self.inner.upload(path, data, content_type, upsert).await?;
        if Self::matches(&self.hold_uploads_containing, path) {
            self.upload_held.notify_one();
            self.release_upload.notified().await;
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Storage("delete refused".into()));
        }
        self.inner.delete(path).await
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        if Self::matches(&self.fail_signing_containing, path) {
            return Err(StorageError::Storage("signing refused".into()));
        }
        self.inner.signed_url(path, ttl).await
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}
