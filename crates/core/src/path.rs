//! Object storage paths for uploaded photos.
//!
//! Paths have the shape
//! `{user}/{document}/{epoch_millis}_{suffix}_{sanitized file name}` so every
//! object is namespaced by owner and document, and two uploads of the same
//! file name never collide.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::types::{DocumentId, UserId};

/// Upper bound on the sanitized file name, in characters.
pub const MAX_FILE_NAME_CHARS: usize = 100;

/// Length of the random collision suffix.
pub const SUFFIX_LEN: usize = 6;

/// Extensions longer than this are not preserved when truncating.
const MAX_EXTENSION_CHARS: usize = 10;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.\- ]+").expect("unsafe-chars regex is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Replace characters outside the safe set with `_`, collapse whitespace runs
/// into `_` and bound the length, keeping a short extension when truncating.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "_");
    let cleaned = WHITESPACE.replace_all(&cleaned, "_");
    let bounded = truncate_keeping_extension(&cleaned, MAX_FILE_NAME_CHARS);
    if bounded.is_empty() {
        "file".to_owned()
    } else {
        bounded
    }
}

fn truncate_keeping_extension(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_owned();
    }
    if let Some(dot) = name.rfind('.') {
        let ext = &name[dot..];
        let ext_chars = ext.chars().count();
        if dot > 0 && ext_chars <= MAX_EXTENSION_CHARS {
            let stem: String = name[..dot].chars().take(max_chars - ext_chars).collect();
            return stem + ext;
        }
    }
    name.chars().take(max_chars).collect()
}

/// A short random lowercase-hex suffix.
pub fn random_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..SUFFIX_LEN].to_owned()
}

/// Build the storage path for one upload.
pub fn object_path(
    user_id: &UserId,
    document_id: &DocumentId,
    uploaded_at: DateTime<Utc>,
    suffix: &str,
    original_name: &str,
) -> String {
    format!(
        "{user_id}/{document_id}/{}_{suffix}_{}",
        uploaded_at.timestamp_millis(),
        sanitize_file_name(original_name)
    )
}

/// Build a fresh storage path stamped with the current time.
pub fn new_object_path(user_id: &UserId, document_id: &DocumentId, original_name: &str) -> String {
    object_path(user_id, document_id, Utc::now(), &random_suffix(), original_name)
}
