//! Error types shared by the SQLite store implementation.

use std::path::PathBuf;

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`SqliteDaoError`] failures.
pub type SqliteResult<T> = Result<T, SqliteDaoError>;

/// Failures that can occur while interacting with the SQLite store file.
#[derive(Debug, Error)]
pub enum SqliteDaoError {
    /// The database file could not be opened or created.
    #[error("failed to open SQLite store `{path}`")]
    Connect {
        /// Store file path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },
    /// The directory holding the store file could not be created.
    #[error("failed to create store directory `{path}`")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// Creating the store tables failed.
    #[error("failed to prepare SQLite schema")]
    Schema {
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },
    /// An incompatible store file could not be removed.
    #[error("failed to remove incompatible store file `{path}`")]
    RemoveFile {
        /// Store file path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// A statement failed while running `operation`.
    #[error("SQLite {operation} failed")]
    Query {
        /// Statement being run.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },
    /// A stored row body is not valid JSON.
    #[error("failed to decode stored row {row_id}")]
    DecodeRow {
        /// Row id in the store file.
        row_id: i64,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored row names an entity this build does not know.
    #[error("stored row {row_id} references unknown entity `{entity}`")]
    UnknownEntity {
        /// Row id in the store file.
        row_id: i64,
        /// Entity name as stored.
        entity: String,
    },
    /// A row id does not fit SQLite's signed integer column.
    #[error("row id {row_id} exceeds SQLite integer range")]
    RowIdRange {
        /// Row id that overflowed.
        row_id: u64,
    },
}

impl From<SqliteDaoError> for StorageError {
    fn from(err: SqliteDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
