//! SQLite-backed [`Store`](crate::dao::store::Store) implementation.

mod error;
mod store;

pub use error::{SqliteDaoError, SqliteResult};
pub use store::SqliteStore;
