//! Draw-cycle scheduling and submission-state engine for the Golden Ticket
//! lottery client.
//!
//! The engine tracks, per game: the next draw and its request quota, the
//! collection of requested combinations, the single per-draw submission and
//! its lock with the backend, and a durable cache of draw results kept fresh
//! by a background poller.

pub mod config;
pub mod dao;
pub mod error;
pub mod quota;
pub mod remote;
pub mod schedule;
pub mod services;
pub mod state;
