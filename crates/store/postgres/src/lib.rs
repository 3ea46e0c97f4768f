pub mod config;
pub mod migrations;
pub mod records;

pub use config::PostgresConfig;
pub use records::PostgresRecordStore;
