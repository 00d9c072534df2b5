//! Record storage.
//!
//! The queue and the dashboard only need ordered inserts and a sorted
//! read-back; [`RecordStore`] is that contract. [`SqliteStore`] is the
//! default engine.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::record::UsageRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create database directory: {0}")]
    Directory(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid stored record {id}: {reason}")]
    InvalidRow { id: String, reason: String },

    #[error("Storage is closed")]
    Closed,

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home for usage records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a single record.
    async fn insert_one(&self, record: &UsageRecord) -> StorageResult<()>;

    /// All records, newest first.
    async fn select_all_ordered_by_timestamp_desc(&self) -> StorageResult<Vec<UsageRecord>>;

    /// Release the underlying handle. Later calls fail with [`StorageError::Closed`].
    async fn close(&self) -> StorageResult<()>;
}

pub type SharedRecordStore = Arc<dyn RecordStore>;
