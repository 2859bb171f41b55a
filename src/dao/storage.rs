use std::error::Error;
use thiserror::Error;

/// Result alias for disk store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by disk stores regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the store was doing.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The store refused the commit.
    #[error("storage rejected commit: {message}")]
    CommitRejected {
        /// Reason given by the store.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
