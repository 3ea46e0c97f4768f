mod auth;
mod objects;
mod records;

pub use auth::MemoryAuthProvider;
pub use objects::MemoryObjectStorage;
pub use records::MemoryRecordStore;
