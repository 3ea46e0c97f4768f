//! The per-owner photo document: one record listing uploaded object paths,
//! plus signed URLs for displaying them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use bodylog_core::{
    DocumentCategory, DocumentPatch, MedDocument, NewDocument, Session, UserId, new_object_path,
};
use bodylog_store::{ObjectStorage, RecordStore, SIGNED_URL_TTL, StoreError};

use crate::confirm::ConfirmationGate;
use crate::error::ClientError;
use crate::gate::{LoadOutcome, OperationGate};

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original file name, sanitized into the object path.
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// A file whose upload failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub name: String,
    pub error: String,
}

/// Per-file results of an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Object paths written, in the order the files were given.
    pub uploaded: Vec<String>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Human-readable summary naming every failed file.
    pub fn summary(&self) -> String {
        let total = self.uploaded.len() + self.failed.len();
        if self.failed.is_empty() {
            return format!("Uploaded {total} file(s)");
        }
        let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
        format!(
            "Uploaded {} of {total} file(s); failed: {}",
            self.uploaded.len(),
            names.join(", ")
        )
    }
}

/// Result of a photo removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Declined,
}

#[derive(Debug, Default)]
struct PhotoState {
    document: Option<MedDocument>,
    urls: BTreeMap<String, String>,
    title: String,
    status: Option<String>,
}

/// Keeps one document per owner and category, and its signed URLs.
pub struct PhotoDocuments {
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStorage>,
    category: DocumentCategory,
    url_ttl: Duration,
    gate: OperationGate,
    state: Mutex<PhotoState>,
}

impl std::fmt::Debug for PhotoDocuments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoDocuments")
            .field("category", &self.category)
            .field("url_ttl", &self.url_ttl)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl PhotoDocuments {
    pub fn new(records: Arc<dyn RecordStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            records,
            storage,
            category: DocumentCategory::RxSupplements,
            url_ttl: SIGNED_URL_TTL,
            gate: OperationGate::new(),
            state: Mutex::new(PhotoState::default()),
        }
    }

    /// Override the signed URL lifetime.
    #[must_use]
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    pub fn category(&self) -> DocumentCategory {
        self.category
    }

    /// The cached document, if loaded.
    pub async fn document(&self) -> Option<MedDocument> {
        self.state.lock().await.document.clone()
    }

    /// Signed URL per path of the cached document.
    pub async fn urls(&self) -> BTreeMap<String, String> {
        self.state.lock().await.urls.clone()
    }

    /// The staged title applied on the next upload.
    pub async fn title(&self) -> String {
        self.state.lock().await.title.clone()
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        self.state.lock().await.title = title.into();
    }

    /// Progress or failure text for the last operation.
    pub async fn status(&self) -> Option<String> {
        self.state.lock().await.status.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Forget the cached document and URLs.
    pub async fn clear(&self) {
        let _ticket = self.gate.begin();
        *self.state.lock().await = PhotoState::default();
    }

    async fn set_status(&self, status: impl Into<String>) {
        self.state.lock().await.status = Some(status.into());
    }

    /// Find the owner's document or create it. A concurrent creator winning
    /// the insert is resolved by reading back its document.
    async fn fetch_or_create(&self, owner: &UserId) -> Result<MedDocument, ClientError> {
        if let Some(doc) = self.records.find_document(owner, self.category).await? {
            return Ok(doc);
        }

        debug!(category = %self.category, "no document yet, creating one");
        match self
            .records
            .insert_document(&NewDocument::empty(owner.clone(), self.category))
            .await
        {
            Ok(doc) => {
                info!(document_id = %doc.id, "document created");
                Ok(doc)
            }
            Err(StoreError::Conflict(reason)) => {
                debug!(reason = %reason, "document created concurrently, re-fetching");
                self.records
                    .find_document(owner, self.category)
                    .await?
                    .ok_or_else(|| {
                        ClientError::Store(StoreError::NotFound(format!(
                            "{} document for {owner}",
                            self.category
                        )))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn cached_or_fetch(&self, owner: &UserId) -> Result<MedDocument, ClientError> {
        let cached = self
            .state
            .lock()
            .await
            .document
            .clone()
            .filter(|doc| &doc.user_id == owner);
        match cached {
            Some(doc) => Ok(doc),
            None => self.fetch_or_create(owner).await,
        }
    }

    /// Issue a signed URL for every path. Paths that fail are skipped.
    async fn sign_all(&self, paths: &[String]) -> BTreeMap<String, String> {
        let signed = join_all(paths.iter().map(|path| async move {
            match self.storage.signed_url(path, self.url_ttl).await {
                Ok(url) => Some((path.clone(), url)),
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping path without signed url");
                    None
                }
            }
        }))
        .await;
        signed.into_iter().flatten().collect()
    }

    /// Apply a document to state, pre-filling an empty staged title.
    fn apply_document(state: &mut PhotoState, doc: MedDocument) {
        if state.title.is_empty()
            && let Some(title) = &doc.title
        {
            state.title.clone_from(title);
        }
        state.document = Some(doc);
    }

    /// Return the owner's document, creating it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the lookup or insert fails.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn ensure_document(&self, session: &Session) -> Result<MedDocument, ClientError> {
        let ticket = self.gate.begin();
        let doc = self.fetch_or_create(&session.user_id).await?;

        let mut state = self.state.lock().await;
        if ticket.is_current() {
            Self::apply_document(&mut state, doc.clone());
        }
        Ok(doc)
    }

    /// Load the owner's document and sign its paths.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the document cannot be resolved.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn load(&self, session: &Session) -> Result<LoadOutcome, ClientError> {
        let ticket = self.gate.begin();
        self.set_status("Checking documents...").await;

        let doc = match self.fetch_or_create(&session.user_id).await {
            Ok(doc) => doc,
            Err(e) => {
                if ticket.is_current() {
                    self.set_status(format!("Failed to load documents: {e}")).await;
                }
                return Err(e);
            }
        };
        let Some(urls) = ticket.read(self.sign_all(&doc.file_paths)).await else {
            return Ok(LoadOutcome::Superseded);
        };

        let mut state = self.state.lock().await;
        if !ticket.is_current() {
            return Ok(LoadOutcome::Superseded);
        }
        Self::apply_document(&mut state, doc);
        state.urls = urls;
        state.status = None;
        Ok(LoadOutcome::Applied)
    }

    /// Rebuild the signed URL map for the cached document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if no document is cached and resolving
    /// it fails.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn refresh_urls(&self, session: &Session) -> Result<LoadOutcome, ClientError> {
        let ticket = self.gate.begin();
        let doc = self.cached_or_fetch(&session.user_id).await?;
        let Some(urls) = ticket.read(self.sign_all(&doc.file_paths)).await else {
            return Ok(LoadOutcome::Superseded);
        };

        let mut state = self.state.lock().await;
        if !ticket.is_current() {
            return Ok(LoadOutcome::Superseded);
        }
        state.urls = urls;
        Ok(LoadOutcome::Applied)
    }

    /// Upload `files` into the owner's document.
    ///
    /// Each file is uploaded on its own; a failure is recorded in the report
    /// and does not stop the others. Successful paths are appended after the
    /// existing ones in a single metadata write, together with the staged
    /// title when one is set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoFiles`] for an empty batch, and
    /// [`ClientError::Store`] if resolving or updating the document fails.
    /// Objects uploaded before a failed metadata write are left in storage.
    #[instrument(skip(self, session, files), fields(user_id = %session.user_id, files = files.len()))]
    pub async fn upload(
        &self,
        session: &Session,
        files: Vec<UploadFile>,
    ) -> Result<UploadReport, ClientError> {
        if files.is_empty() {
            return Err(ClientError::NoFiles);
        }
        let owner = &session.user_id;
        let ticket = self.gate.begin();

        let doc = self.cached_or_fetch(owner).await?;
        self.set_status(format!("Uploading {} file(s)...", files.len()))
            .await;

        let mut report = UploadReport::default();
        for file in files {
            let path = new_object_path(owner, &doc.id, &file.name);
            match self
                .storage
                .upload(&path, file.data, &file.content_type, true)
                .await
            {
                Ok(()) => {
                    debug!(path = %path, "file uploaded");
                    report.uploaded.push(path);
                }
                Err(e) => {
                    warn!(name = %file.name, error = %e, "file upload failed");
                    report.failed.push(UploadFailure {
                        name: file.name,
                        error: e.to_string(),
                    });
                }
            }
        }

        // The cache can lag behind writes that landed during the uploads.
        let doc = self.fetch_or_create(owner).await?;
        let title = self.state.lock().await.title.trim().to_owned();
        let mut patch = DocumentPatch::paths(doc.merged_paths(&report.uploaded));
        if !title.is_empty() {
            patch = patch.with_title(title);
        }

        let updated = match self.records.update_document(owner, &doc.id, &patch).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(
                    orphaned = ?report.uploaded,
                    error = %e,
                    "document update failed after upload; objects left in storage"
                );
                if ticket.is_current() {
                    self.set_status(format!("Failed to save document: {e}")).await;
                }
                return Err(e.into());
            }
        };
        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "upload batch finished"
        );

        let urls = self.sign_all(&updated.file_paths).await;
        let mut state = self.state.lock().await;
        Self::apply_document(&mut state, updated);
        if ticket.is_current() {
            state.urls = urls;
            state.status = Some(report.summary());
        }
        Ok(report)
    }

    /// Delete one photo after the user confirms.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the object cannot be deleted, in
    /// which case the document is untouched, and [`ClientError::Store`] if
    /// the document update fails.
    #[instrument(skip(self, session, confirmation), fields(user_id = %session.user_id))]
    pub async fn remove_file(
        &self,
        session: &Session,
        path: &str,
        confirmation: &dyn ConfirmationGate,
    ) -> Result<RemoveOutcome, ClientError> {
        if !confirmation.confirm("Delete this photo?") {
            debug!("removal declined");
            return Ok(RemoveOutcome::Declined);
        }
        let owner = &session.user_id;
        let ticket = self.gate.begin();

        let existed = self.storage.delete(path).await?;
        debug!(existed, "object deleted");

        let doc = self.fetch_or_create(owner).await?;
        let doc = if doc.contains_path(path) {
            let patch = DocumentPatch::paths(doc.paths_without(path));
            self.records.update_document(owner, &doc.id, &patch).await?
        } else {
            doc
        };
        info!(path = %path, "photo removed");

        let urls = self.sign_all(&doc.file_paths).await;
        let mut state = self.state.lock().await;
        Self::apply_document(&mut state, doc);
        if ticket.is_current() {
            state.urls = urls;
        }
        Ok(RemoveOutcome::Removed)
    }
}

#[cfg(test)]
mod tests {
    use bodylog_core::DEFAULT_DOCUMENT_TITLE;
    use bodylog_store_memory::{MemoryObjectStorage, MemoryRecordStore};

    use super::*;
    use crate::confirm::AutoConfirm;

    fn setup() -> (
        Arc<MemoryRecordStore>,
        Arc<MemoryObjectStorage>,
        PhotoDocuments,
        Session,
    ) {
        let records = Arc::new(MemoryRecordStore::new());
        let storage = Arc::new(MemoryObjectStorage::default());
        let photos = PhotoDocuments::new(records.clone(), storage.clone());
        (records, storage, photos, Session::new("user-1"))
    }

    fn png(name: &str) -> UploadFile {
        UploadFile::new(name, "image/png", Bytes::from_static(b"png"))
    }

    #[tokio::test]
    async fn ensure_document_is_idempotent() {
        let (records, _storage, photos, session) = setup();
        let first = photos.ensure_document(&session).await.unwrap();
        let second = photos.ensure_document(&session).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.title.as_deref(), Some(DEFAULT_DOCUMENT_TITLE));
        assert_eq!(records.document_count(), 1);
        assert_eq!(photos.title().await, DEFAULT_DOCUMENT_TITLE);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (records, _storage, photos, session) = setup();
        let err = photos.upload(&session, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::NoFiles));
        assert_eq!(records.document_count(), 0);
    }

    #[tokio::test]
    async fn upload_appends_paths_and_signs_them() {
        let (_records, storage, photos, session) = setup();
        let report = photos
            .upload(&session, vec![png("a.png"), png("b c.png")])
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.uploaded.len(), 2);
        assert!(report.uploaded[1].ends_with("_b_c.png"));

        let doc = photos.document().await.unwrap();
        assert_eq!(doc.file_paths, report.uploaded);
        assert!(
            doc.file_paths
                .iter()
                .all(|p| p.starts_with(&format!("user-1/{}/", doc.id)))
        );
        assert_eq!(storage.len(), 2);
        assert_eq!(photos.urls().await.len(), 2);
        assert_eq!(photos.status().await.as_deref(), Some("Uploaded 2 file(s)"));
    }

    #[tokio::test]
    async fn staged_title_is_trimmed_and_saved() {
        let (_records, _storage, photos, session) = setup();
        photos.set_title("  Vitamin D  ").await;
        photos.upload(&session, vec![png("d.png")]).await.unwrap();
        let doc = photos.document().await.unwrap();
        assert_eq!(doc.title.as_deref(), Some("Vitamin D"));
    }

    #[tokio::test]
    async fn removing_absent_path_keeps_list() {
        let (_records, _storage, photos, session) = setup();
        photos.upload(&session, vec![png("a.png")]).await.unwrap();
        let before = photos.document().await.unwrap().file_paths;

        let outcome = photos
            .remove_file(&session, "user-1/nope/0_x_y.png", &AutoConfirm(true))
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(photos.document().await.unwrap().file_paths, before);
    }

    #[tokio::test]
    async fn declined_removal_touches_nothing() {
        let (_records, storage, photos, session) = setup();
        let report = photos.upload(&session, vec![png("a.png")]).await.unwrap();
        let path = &report.uploaded[0];

        let outcome = photos
            .remove_file(&session, path, &AutoConfirm(false))
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::Declined);
        assert!(storage.contains(path));
    }

    #[tokio::test]
    async fn remove_file_updates_document_and_urls() {
        let (_records, storage, photos, session) = setup();
        let report = photos
            .upload(&session, vec![png("a.png"), png("b.png")])
            .await
            .unwrap();
        let removed = report.uploaded[0].clone();

        photos
            .remove_file(&session, &removed, &AutoConfirm(true))
            .await
            .unwrap();
        let doc = photos.document().await.unwrap();
        assert_eq!(doc.file_paths, vec![report.uploaded[1].clone()]);
        assert!(!storage.contains(&removed));
        assert!(!photos.urls().await.contains_key(&removed));
    }

    #[tokio::test]
    async fn load_signs_existing_paths() {
        let (_records, _storage, photos, session) = setup();
        photos.upload(&session, vec![png("a.png")]).await.unwrap();
        photos.clear().await;
        assert!(photos.document().await.is_none());

        let outcome = photos.load(&session).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied);
        assert_eq!(photos.urls().await.len(), 1);
        assert!(photos.status().await.is_none());
    }

    #[test]
    fn report_summary_names_failures() {
        let report = UploadReport {
            uploaded: vec!["p1".into(), "p2".into()],
            failed: vec![UploadFailure {
                name: "broken.jpg".into(),
                error: "storage error: boom".into(),
            }],
        };
        assert_eq!(
            report.summary(),
            "Uploaded 2 of 3 file(s); failed: broken.jpg"
        );
    }
}
