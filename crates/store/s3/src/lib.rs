pub mod config;
pub mod objects;

pub use config::S3Config;
pub use objects::S3ObjectStorage;
