use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDate;

use bodylog_core::{
    DocumentCategory, DocumentPatch, EntryFields, EntryId, NewDocument, NewEntry, UserId,
};

use crate::error::{StorageError, StoreError};
use crate::objects::ObjectStorage;
use crate::records::RecordStore;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).expect("valid test date")
}

fn fields(weight: f64, knee_pain: i32) -> EntryFields {
    EntryFields {
        weight: Some(weight),
        knee_pain,
        ..EntryFields::default()
    }
}

/// Run the full record store conformance test suite.
///
/// Every test uses a freshly generated owner, so the suite can run against a
/// shared store. Call this from your backend's test module.
///
/// # Errors
///
/// Returns an error if any store call fails unexpectedly.
pub async fn run_record_store_conformance_tests(store: &dyn RecordStore) -> Result<(), StoreError> {
    test_list_empty(store).await?;
    test_insert_and_find(store).await?;
    test_insert_duplicate_date_conflicts(store).await?;
    test_update_keeps_identity(store).await?;
    test_update_missing(store).await?;
    test_upsert_inserts_then_updates(store).await?;
    test_list_order(store).await?;
    test_delete_scoped_by_owner(store).await?;
    test_document_lifecycle(store).await?;
    test_document_duplicate_conflicts(store).await?;
    test_document_update_scoped_by_owner(store).await?;
    Ok(())
}

async fn test_list_empty(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let entries = store.list_entries(&owner).await?;
    assert!(entries.is_empty(), "new owner should have no entries");
    Ok(())
}

async fn test_insert_and_find(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let inserted = store
        .insert_entry(&NewEntry::new(owner.clone(), day(5), fields(70.2, 0)))
        .await?;
    assert_eq!(inserted.date, day(5));
    assert_eq!(inserted.fields.weight, Some(70.2));

    let found = store.find_entry(&owner, day(5)).await?;
    assert_eq!(found.map(|e| e.id), Some(inserted.id));

    let missing = store.find_entry(&owner, day(6)).await?;
    assert!(missing.is_none(), "no entry on another date");
    Ok(())
}

async fn test_insert_duplicate_date_conflicts(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    store
        .insert_entry(&NewEntry::new(owner.clone(), day(7), fields(70.0, 1)))
        .await?;
    let second = store
        .insert_entry(&NewEntry::new(owner.clone(), day(7), fields(71.0, 2)))
        .await;
    assert!(
        matches!(second, Err(StoreError::Conflict(_))),
        "second insert on the same date should conflict"
    );
    assert_eq!(store.list_entries(&owner).await?.len(), 1);
    Ok(())
}

async fn test_update_keeps_identity(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let inserted = store
        .insert_entry(&NewEntry::new(owner.clone(), day(8), fields(70.0, 1)))
        .await?;
    let updated = store
        .update_entry(&owner, &inserted.id, &fields(69.5, 4))
        .await?;
    assert_eq!(updated.id, inserted.id);
    assert_eq!(updated.date, inserted.date);
    assert_eq!(updated.created_at, inserted.created_at);
    assert_eq!(updated.fields.weight, Some(69.5));
    assert_eq!(updated.fields.knee_pain, 4);
    Ok(())
}

async fn test_update_missing(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let result = store
        .update_entry(&owner, &EntryId::generate(), &fields(70.0, 0))
        .await;
    assert!(
        matches!(result, Err(StoreError::NotFound(_))),
        "updating a missing entry should be NotFound"
    );
    Ok(())
}

async fn test_upsert_inserts_then_updates(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let first = store
        .upsert_entry(&NewEntry::new(owner.clone(), day(9), fields(70.0, 1)))
        .await?;
    let second = store
        .upsert_entry(&NewEntry::new(owner.clone(), day(9), fields(68.0, 3)))
        .await?;
    assert_eq!(first.id, second.id, "upsert on the same key should update");

    let entries = store.list_entries(&owner).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].fields.weight, Some(68.0));
    assert_eq!(entries[0].fields.knee_pain, 3);
    Ok(())
}

async fn test_list_order(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    for d in [3, 10, 1] {
        store
            .insert_entry(&NewEntry::new(owner.clone(), day(d), fields(70.0, 0)))
            .await?;
    }
    let dates: Vec<NaiveDate> = store
        .list_entries(&owner)
        .await?
        .into_iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(dates, vec![day(10), day(3), day(1)]);
    Ok(())
}

async fn test_delete_scoped_by_owner(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let intruder = UserId::generate();
    let entry = store
        .insert_entry(&NewEntry::new(owner.clone(), day(11), fields(70.0, 0)))
        .await?;

    let stolen = store.delete_entry(&intruder, &entry.id).await?;
    assert!(!stolen, "another user must not delete the entry");
    assert_eq!(store.list_entries(&owner).await?.len(), 1);

    assert!(store.delete_entry(&owner, &entry.id).await?);
    assert!(store.list_entries(&owner).await?.is_empty());
    assert!(
        !store.delete_entry(&owner, &entry.id).await?,
        "second delete should report a missing entry"
    );
    Ok(())
}

async fn test_document_lifecycle(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let category = DocumentCategory::RxSupplements;
    assert!(store.find_document(&owner, category).await?.is_none());

    let created = store
        .insert_document(&NewDocument::empty(owner.clone(), category))
        .await?;
    assert!(created.file_paths.is_empty());

    let found = store.find_document(&owner, category).await?;
    assert_eq!(found.as_ref().map(|d| &d.id), Some(&created.id));

    let patch = DocumentPatch::paths(vec!["a".into(), "b".into()]).with_title("Pills");
    let updated = store.update_document(&owner, &created.id, &patch).await?;
    assert_eq!(updated.file_paths, vec!["a", "b"]);
    assert_eq!(updated.title.as_deref(), Some("Pills"));

    let paths_only = DocumentPatch::paths(vec!["b".into()]);
    let updated = store
        .update_document(&owner, &created.id, &paths_only)
        .await?;
    assert_eq!(updated.file_paths, vec!["b"]);
    assert_eq!(updated.title.as_deref(), Some("Pills"), "title untouched");
    Ok(())
}

async fn test_document_duplicate_conflicts(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let category = DocumentCategory::RxSupplements;
    store
        .insert_document(&NewDocument::empty(owner.clone(), category))
        .await?;
    let second = store
        .insert_document(&NewDocument::empty(owner.clone(), category))
        .await;
    assert!(
        matches!(second, Err(StoreError::Conflict(_))),
        "second document in the same category should conflict"
    );
    Ok(())
}

async fn test_document_update_scoped_by_owner(store: &dyn RecordStore) -> Result<(), StoreError> {
    let owner = UserId::generate();
    let intruder = UserId::generate();
    let doc = store
        .insert_document(&NewDocument::empty(
            owner.clone(),
            DocumentCategory::RxSupplements,
        ))
        .await?;
    let result = store
        .update_document(&intruder, &doc.id, &DocumentPatch::paths(vec!["x".into()]))
        .await;
    assert!(
        matches!(result, Err(StoreError::NotFound(_))),
        "another user must not update the document"
    );
    Ok(())
}

/// Run the full object storage conformance test suite.
///
/// # Errors
///
/// Returns an error if any storage call fails unexpectedly.
pub async fn run_object_storage_conformance_tests(
    storage: &dyn ObjectStorage,
) -> Result<(), StorageError> {
    test_upload_and_sign(storage).await?;
    test_upload_without_upsert_conflicts(storage).await?;
    test_upload_with_upsert_overwrites(storage).await?;
    test_delete_object(storage).await?;
    Ok(())
}

async fn test_upload_and_sign(storage: &dyn ObjectStorage) -> Result<(), StorageError> {
    let path = "conformance/doc/1_abc_photo.jpg";
    storage
        .upload(path, Bytes::from_static(b"jpeg"), "image/jpeg", true)
        .await?;
    let url = storage.signed_url(path, Duration::from_secs(3600)).await?;
    assert!(!url.is_empty(), "signed url should not be empty");
    Ok(())
}

async fn test_upload_without_upsert_conflicts(
    storage: &dyn ObjectStorage,
) -> Result<(), StorageError> {
    let path = "conformance/doc/2_abc_photo.jpg";
    storage.delete(path).await?;
    storage
        .upload(path, Bytes::from_static(b"one"), "image/jpeg", false)
        .await?;
    let second = storage
        .upload(path, Bytes::from_static(b"two"), "image/jpeg", false)
        .await;
    assert!(
        matches!(second, Err(StorageError::AlreadyExists(_))),
        "upload without upsert should not overwrite"
    );
    Ok(())
}

async fn test_upload_with_upsert_overwrites(
    storage: &dyn ObjectStorage,
) -> Result<(), StorageError> {
    let path = "conformance/doc/3_abc_photo.jpg";
    storage
        .upload(path, Bytes::from_static(b"one"), "image/jpeg", true)
        .await?;
    storage
        .upload(path, Bytes::from_static(b"two"), "image/jpeg", true)
        .await?;
    Ok(())
}

async fn test_delete_object(storage: &dyn ObjectStorage) -> Result<(), StorageError> {
    let path = "conformance/doc/4_abc_photo.jpg";
    storage
        .upload(path, Bytes::from_static(b"bye"), "image/png", true)
        .await?;
    assert!(storage.delete(path).await?, "delete should report existing object");
    assert!(!storage.delete(path).await?, "second delete should report missing");
    Ok(())
}
