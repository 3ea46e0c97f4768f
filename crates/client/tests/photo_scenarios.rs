//! Photo document scenarios: creation races, partial upload batches and
//! failure handling.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use bytes::Bytes;

use bodylog_client::{AutoConfirm, ClientError, PhotoDocuments, UploadFile};
use bodylog_core::{DocumentCategory, NewDocument, Session};
use bodylog_store::RecordStore;
use bodylog_store_memory::{MemoryObjectStorage, MemoryRecordStore};

use common::{FlakyStorage, RacingDocuments, ScriptedRecords};

fn session() -> Session {
    Session::new("user-1")
}

fn jpeg(name: &str) -> UploadFile {
    UploadFile::new(name, "image/jpeg", Bytes::from(name.as_bytes().to_vec()))
}

#[tokio::test]
async fn partial_batch_appends_successful_paths_in_order() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = FlakyStorage::failing_uploads("broken");
    let photos = PhotoDocuments::new(records.clone(), storage.clone());
    let session = session();

    let existing = photos.upload(&session, vec![jpeg("first.jpg")]).await.unwrap();

    let report = photos
        .upload(
            &session,
            vec![jpeg("a.jpg"), jpeg("broken.jpg"), jpeg("c.jpg")],
        )
        .await
        .unwrap();

    assert_eq!(report.uploaded.len(), 2);
    assert!(report.uploaded[0].ends_with("_a.jpg"));
    assert!(report.uploaded[1].ends_with("_c.jpg"));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "broken.jpg");

    let doc = photos.document().await.unwrap();
    let mut expected = existing.uploaded.clone();
    expected.extend(report.uploaded.iter().cloned());
    assert_eq!(doc.file_paths, expected);

    let status = photos.status().await.unwrap();
    assert!(status.contains("broken.jpg"), "status was {status:?}");
    assert_eq!(photos.urls().await.len(), 3);
}

#[tokio::test]
async fn batch_where_every_file_fails_still_succeeds() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = FlakyStorage::failing_uploads("jpg");
    let photos = PhotoDocuments::new(records, storage);

    let report = photos
        .upload(&session(), vec![jpeg("a.jpg"), jpeg("b.jpg")])
        .await
        .unwrap();
    assert!(report.uploaded.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(photos.document().await.unwrap().file_paths.is_empty());
}

#[tokio::test]
async fn creation_conflict_returns_existing_document() {
    let inner = MemoryRecordStore::new();
    let session = session();
    let existing = inner
        .insert_document(&NewDocument::empty(
            session.user_id.clone(),
            DocumentCategory::RxSupplements,
        ))
        .await
        .unwrap();

    let records = RacingDocuments::new(inner);
    let photos = PhotoDocuments::new(records.clone(), Arc::new(MemoryObjectStorage::default()));
    let doc = photos.ensure_document(&session).await.unwrap();

    assert_eq!(doc.id, existing.id);
    assert_eq!(records.inner.document_count(), 1);
}

#[tokio::test]
async fn concurrent_ensures_share_one_document() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = Arc::new(MemoryObjectStorage::default());
    let tab_a = PhotoDocuments::new(records.clone(), storage.clone());
    let tab_b = PhotoDocuments::new(records.clone(), storage);
    let session = session();

    let (a, b) = tokio::join!(tab_a.ensure_document(&session), tab_b.ensure_document(&session));
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(records.document_count(), 1);
}

#[tokio::test]
async fn failed_metadata_write_leaves_orphans_and_document_untouched() {
    let records = ScriptedRecords::new();
    let storage = Arc::new(MemoryObjectStorage::default());
    let photos = PhotoDocuments::new(records.clone(), storage.clone());
    let session = session();

    let before = photos.ensure_document(&session).await.unwrap();
    records.fail_document_updates.store(true, Ordering::SeqCst);

    let err = photos
        .upload(&session, vec![jpeg("a.jpg")])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Store(_)));
    assert!(err.to_string().contains("update rejected"));

    assert_eq!(storage.len(), 1, "uploaded object stays in storage");
    let stored = records
        .inner
        .find_document(&session.user_id, DocumentCategory::RxSupplements)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.file_paths, before.file_paths);
    assert!(
        photos
            .status()
            .await
            .is_some_and(|s| s.contains("update rejected"))
    );
}

#[tokio::test]
async fn failed_object_delete_keeps_path_list() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = FlakyStorage::new();
    let photos = PhotoDocuments::new(records, storage.clone());
    let session = session();

    let report = photos.upload(&session, vec![jpeg("a.jpg")]).await.unwrap();
    storage.fail_deletes.store(true, Ordering::SeqCst);

    let err = photos
        .remove_file(&session, &report.uploaded[0], &AutoConfirm(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Storage(_)));
    assert_eq!(
        photos.document().await.unwrap().file_paths,
        report.uploaded
    );
}

#[tokio::test]
async fn unsignable_paths_are_skipped() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = FlakyStorage::new();
    let photos = PhotoDocuments::new(records, storage.clone());
    let session = session();

    let report = photos
        .upload(&session, vec![jpeg("keep.jpg"), jpeg("hidden.jpg")])
        .await
        .unwrap();
    *storage.fail_signing_containing.lock().unwrap() = Some("hidden".into());

    photos.refresh_urls(&session).await.unwrap();
    let urls = photos.urls().await;
    assert_eq!(urls.len(), 1);
    assert!(urls.contains_key(&report.uploaded[0]));
}

#[tokio::test]
async fn remove_without_cached_document_resolves_it() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = Arc::new(MemoryObjectStorage::default());
    let session = session();

    let uploader = PhotoDocuments::new(records.clone(), storage.clone());
    let report = uploader
        .upload(&session, vec![jpeg("a.jpg"), jpeg("b.jpg")])
        .await
        .unwrap();

    let fresh = PhotoDocuments::new(records, storage.clone());
    fresh
        .remove_file(&session, &report.uploaded[0], &AutoConfirm(true))
        .await
        .unwrap();

    let doc = fresh.document().await.unwrap();
    assert_eq!(doc.file_paths, vec![report.uploaded[1].clone()]);
    assert!(!storage.contains(&report.uploaded[0]));
}

#[tokio::test]
async fn load_during_upload_keeps_paths_for_next_upload() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = FlakyStorage::holding_uploads("slow");
    let photos = PhotoDocuments::new(records.clone(), storage.clone());
    let session = session();
    photos.ensure_document(&session).await.unwrap();

    let (first, loaded) = tokio::join!(photos.upload(&session, vec![jpeg("slow.jpg")]), async {
        storage.upload_held.notified().await;
        let outcome = photos.load(&session).await;
        storage.release_upload.notify_one();
        outcome
    });
    let first = first.unwrap();
    loaded.unwrap();

    let second = photos.upload(&session, vec![jpeg("next.jpg")]).await.unwrap();

    let stored = records
        .find_document(&session.user_id, DocumentCategory::RxSupplements)
        .await
        .unwrap()
        .unwrap();
    let expected = vec![first.uploaded[0].clone(), second.uploaded[0].clone()];
    assert_eq!(stored.file_paths, expected);
    assert_eq!(photos.document().await.unwrap().file_paths, expected);
}

#[tokio::test]
async fn writes_merge_against_stored_list() {
    let records = Arc::new(MemoryRecordStore::new());
    let storage = Arc::new(MemoryObjectStorage::default());
    let tab_a = PhotoDocuments::new(records.clone(), storage.clone());
    let tab_b = PhotoDocuments::new(records.clone(), storage.clone());
    let session = session();

    tab_a.load(&session).await.unwrap();
    let from_b = tab_b.upload(&session, vec![jpeg("b.jpg")]).await.unwrap();
    let from_a = tab_a.upload(&session, vec![jpeg("a.jpg")]).await.unwrap();
    assert_eq!(
        tab_a.document().await.unwrap().file_paths,
        vec![from_b.uploaded[0].clone(), from_a.uploaded[0].clone()]
    );

    tab_b
        .remove_file(&session, &from_a.uploaded[0], &AutoConfirm(true))
        .await
        .unwrap();
    let stored = records
        .find_document(&session.user_id, DocumentCategory::RxSupplements)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.file_paths, from_b.uploaded);
}
