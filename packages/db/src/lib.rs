//! SurrealDB integration for job records.
//!
//! This crate provides database connectivity and the repository that
//! persists job records.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect, get_db, init_db};
pub use repositories::{JobFilter, JobRepository, WriteOutcome};
pub use schema::init_schema;

/// Initialize the global database with the given configuration.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<&'static Database, DbError> {
    init_db(config).await
}
