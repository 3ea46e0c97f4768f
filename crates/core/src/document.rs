use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, UserId};

/// Title given to a document created on first access.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Prescriptions & supplements";

/// The kind of photo collection a document holds.
///
/// A user has at most one document per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    /// Photos of current prescriptions and supplements.
    RxSupplements,
}

impl DocumentCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RxSupplements => "rx_supplements",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rx_supplements" => Ok(Self::RxSupplements),
            other => Err(format!("unknown document category: {other}")),
        }
    }
}

/// A per-user, per-category container of uploaded photo paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedDocument {
    pub id: DocumentId,
    pub user_id: UserId,
    pub category: DocumentCategory,
    pub title: Option<String>,
    /// Storage paths in upload order.
    pub file_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedDocument {
    /// Existing paths followed by `new_paths`, preserving both orders.
    pub fn merged_paths(&self, new_paths: &[String]) -> Vec<String> {
        self.file_paths
            .iter()
            .chain(new_paths)
            .cloned()
            .collect()
    }

    /// The path list with every occurrence of `path` removed.
    pub fn paths_without(&self, path: &str) -> Vec<String> {
        self.file_paths
            .iter()
            .filter(|p| p.as_str() != path)
            .cloned()
            .collect()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.file_paths.iter().any(|p| p == path)
    }
}

/// A document about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub user_id: UserId,
    pub category: DocumentCategory,
    pub title: Option<String>,
    pub file_paths: Vec<String>,
}

impl NewDocument {
    /// An empty document carrying the default title.
    pub fn empty(user_id: impl Into<UserId>, category: DocumentCategory) -> Self {
        Self {
            user_id: user_id.into(),
            category,
            title: Some(DEFAULT_DOCUMENT_TITLE.to_owned()),
            file_paths: Vec::new(),
        }
    }
}

/// A partial update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub file_paths: Option<Vec<String>>,
}

impl DocumentPatch {
    pub fn paths(file_paths: Vec<String>) -> Self {
        Self {
            title: None,
            file_paths: Some(file_paths),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Apply the patch to `doc` in place.
    pub fn apply(&self, doc: &mut MedDocument) {
        if let Some(ref title) = self.title {
            doc.title = Some(title.clone());
        }
        if let Some(ref paths) = self.file_paths {
            doc.file_paths.clone_from(paths);
        }
    }
}
