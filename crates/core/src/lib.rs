pub mod document;
pub mod entry;
pub mod error;
pub mod form;
pub mod path;
pub mod session;
pub mod types;

pub use document::{DEFAULT_DOCUMENT_TITLE, DocumentCategory, DocumentPatch, MedDocument, NewDocument};
pub use entry::{BodyEntry, EntryFields, KNEE_PAIN_MAX, KNEE_PAIN_MIN, NewEntry, sort_recent_first};
pub use error::ValidationError;
pub use form::{DATE_FORMAT, EditingContext, EntryForm, today_local};
pub use path::{new_object_path, sanitize_file_name};
pub use session::Session;
pub use types::{DocumentId, EntryId, UserId};
