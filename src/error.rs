//! Service-layer error taxonomy.

use chrono::NaiveDate;
use thiserror::Error;

use crate::dao::storage::StorageError;
use crate::remote::ApiError;
use crate::schedule::ScheduleError;
use crate::state::crucible::CrucibleError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Local store failed or returned a corrupted row.
    #[error("local store failure")]
    Storage(#[source] StorageError),
    /// Remote API call failed; timeouts and transport faults are transient.
    #[error("remote api failure")]
    Api(#[from] ApiError),
    /// The game's recurrence specification is unusable.
    #[error("invalid draw schedule")]
    Schedule(#[from] ScheduleError),
    /// A crucible mutation was rejected by its guards. Expected user-facing
    /// condition; no side effects occurred.
    #[error("crucible mutation rejected")]
    Crucible(#[from] CrucibleError),
    /// The operation requires a signed-in user.
    #[error("no user is signed in")]
    NotSignedIn,
    /// The request quota for the draw is exhausted.
    #[error("request quota exhausted ({limit} allowed)")]
    QuotaExhausted {
        /// Server-assigned request limit.
        limit: u32,
    },
    /// The schedule cannot produce a draw instant for this date.
    #[error("draw date {draw_date} of `{game}` does not match the schedule")]
    UnusableDrawDate {
        /// Game whose schedule was consulted.
        game: String,
        /// The date that matched no schedule entry.
        draw_date: NaiveDate,
    },
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl ServiceError {
    /// Whether the failure is transient and worth retrying on the next poll
    /// cycle or user-initiated retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Api(err) if err.is_transient())
    }
}
