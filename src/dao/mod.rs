//! Local persistence layer: entities, storage errors, and store backends.

pub mod models;
pub mod storage;
pub mod store;
