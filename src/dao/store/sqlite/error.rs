//! Error types shared by the SQLite storage implementation.

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`SqliteDaoError`] failures.
pub type SqliteResult<T> = Result<T, SqliteDaoError>;

/// Failures that can occur while interacting with the SQLite database.
#[derive(Debug, Error)]
pub enum SqliteDaoError {
    /// Opening the database file or connection pool failed.
    #[error("failed to open SQLite database at `{path}`")]
    Open {
        /// Path of the database file.
        path: String,
        /// Underlying driver failure.
        #[source]
        source: sqlx::Error,
    },
    /// Creating the schema failed.
    #[error("failed to create SQLite schema")]
    Schema {
        /// Underlying driver failure.
        #[source]
        source: sqlx::Error,
    },
    /// A query could not be executed.
    #[error("SQLite query failed during {operation}")]
    Query {
        /// Short description of the failing operation.
        operation: &'static str,
        /// Underlying driver failure.
        #[source]
        source: sqlx::Error,
    },
    /// A row was read but its columns could not be decoded into the entity.
    #[error("failed to decode SQLite row during {operation}")]
    DecodeRow {
        /// Short description of the failing operation.
        operation: &'static str,
        /// Underlying decode failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<SqliteDaoError> for StorageError {
    fn from(err: SqliteDaoError) -> Self {
        match err {
            SqliteDaoError::DecodeRow { .. } => {
                StorageError::corrupted("sqlite row decode failed".into(), err)
            }
            other => StorageError::unavailable("sqlite backend failure".into(), other),
        }
    }
}
