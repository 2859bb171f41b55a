use thiserror::Error;

use crate::dao::{change_set::RowId, models::EntityName, storage::StorageError};

/// Result alias for context-level persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Failures raised by the context tiers and the data access helpers.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The disk tier refused or failed the commit.
    #[error("disk commit failed")]
    Storage(#[from] StorageError),
    /// A row could not be converted into its stored form.
    #[error("failed to encode {entity} row")]
    Encode {
        /// Entity of the offending row.
        entity: EntityName,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored row does not match the entity's current shape.
    #[error("failed to decode {entity} row {row_id}")]
    Decode {
        /// Entity of the offending row.
        entity: EntityName,
        /// Row that failed to decode.
        row_id: RowId,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// A get-or-create lookup matched more than one row.
    #[error("{matches} {entity} rows match a lookup expecting at most one")]
    Ambiguous {
        /// Entity that was looked up.
        entity: EntityName,
        /// Number of rows that matched.
        matches: usize,
    },
}
