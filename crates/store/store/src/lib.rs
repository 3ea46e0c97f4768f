pub mod auth;
pub mod error;
pub mod objects;
pub mod records;
pub mod testing;

pub use auth::AuthProvider;
pub use error::{AuthError, StorageError, StoreError};
pub use objects::{ObjectStorage, SIGNED_URL_TTL};
pub use records::RecordStore;
