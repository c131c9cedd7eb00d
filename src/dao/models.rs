//! Entities persisted by the local store and shared across layers.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Static per-game configuration, seeded once at initialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRule {
    /// Game identifier, e.g. `golden-7`.
    pub game: String,
    /// Size of the regular number pool.
    pub pool_size: u32,
    /// Count of regular numbers drawn; also the required crucible size.
    pub regular_count: u32,
    /// Size of the bonus number pool.
    pub bonus_pool_size: u32,
    /// Count of bonus numbers drawn.
    pub bonus_count: u32,
    /// Weekly recurrence specification, `Weekday HH:mm Zone/Id` triples.
    pub schedule: String,
    /// Prize-tier format label shown alongside odds.
    pub tier_format: String,
    /// Human-readable odds strings keyed by tier label.
    pub odds: HashMap<String, String>,
}

/// Server-reported metadata for one (game, draw date) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawInfo {
    /// Game identifier.
    pub game: String,
    /// Calendar date of the draw.
    pub draw_date: NaiveDate,
    /// Total size of the combination space for this draw.
    pub total_combinations: u64,
    /// Per-user request limit, when the server reported one.
    pub request_limit: Option<u32>,
    /// Requests the user has consumed so far; monotone non-decreasing
    /// within a draw once requests begin.
    pub requests_used: Option<u32>,
    /// Opaque server-issued integrity token for the combination pool.
    pub archive_checksum: Option<String>,
    /// When this row was last refreshed from the remote.
    pub updated_at: DateTime<Utc>,
}

/// A requested-but-uncommitted combination, identified by its server id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingot {
    /// Server-issued sequence id; the local identity of the item.
    pub id: i64,
    /// Owning user.
    pub user_id: String,
    /// Game the combination belongs to.
    pub game: String,
    /// Draw the combination targets.
    pub draw_date: NaiveDate,
    /// The combination itself, in server order.
    pub numbers: Vec<u32>,
    /// When the item entered the collection; drives recency ordering.
    pub collected_at: DateTime<Utc>,
}

/// Lifecycle status of a crucible.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrucibleStatus {
    /// Editable; items can be added, swapped, and the crucible locked.
    Draft,
    /// Lock confirmed with the remote; immutable from the client side.
    Submitted,
    /// Reserved terminal status, treated the same as submitted.
    Locked,
}

impl CrucibleStatus {
    /// Whether the crucible can still be mutated.
    pub fn is_editable(self) -> bool {
        matches!(self, CrucibleStatus::Draft)
    }
}

/// The user's single per-draw submission of combinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crucible {
    /// Persisted identifier, absent until the first save.
    pub id: Option<Uuid>,
    /// Owning user.
    pub user_id: String,
    /// Game the submission targets.
    pub game: String,
    /// Draw the submission targets.
    pub draw_date: NaiveDate,
    /// Ordered combinations placed into the crucible.
    pub ingots: Vec<Ingot>,
    /// Lifecycle status.
    pub status: CrucibleStatus,
    /// Last local modification time.
    pub updated_at: DateTime<Utc>,
}

/// Cached finalized (or placeholder) result for one (game, draw date) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawResult {
    /// Game identifier.
    pub game: String,
    /// Calendar date of the draw.
    pub draw_date: NaiveDate,
    /// Winning numbers; empty until the draw is finalized.
    pub winning_numbers: Vec<u32>,
    /// Bonus number, when the game has one.
    pub bonus_number: Option<u32>,
    /// Per-tier odds as decimals.
    pub odds: HashMap<String, f64>,
    /// Set when non-empty winning numbers arrive; cleared once viewed.
    pub is_new: bool,
    /// Win/claim identifier, when the user won something.
    pub win_id: Option<String>,
    /// Opaque archive password issued with finalized results.
    pub archive_password: Option<String>,
    /// Opaque archive checksum issued with finalized results.
    pub archive_checksum: Option<String>,
    /// When this row was last fetched from the remote.
    pub fetched_at: DateTime<Utc>,
}

/// Cumulative per-(user, game) progress, consumed by the sync orchestrator
/// to decide which games a user follows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserGameProgress {
    /// Owning user.
    pub user_id: String,
    /// Game identifier.
    pub game: String,
    /// Cumulative score.
    pub score: i64,
    /// Awards earned so far.
    pub awards: Vec<String>,
    /// Free-form statistics blob.
    pub stats: serde_json::Value,
    /// Last time the user played this game.
    pub last_played: Option<DateTime<Utc>>,
}

/// Scope key for ingot and crucible operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DrawScope {
    /// Owning user.
    pub user_id: String,
    /// Game identifier.
    pub game: String,
    /// Draw the scope targets.
    pub draw_date: NaiveDate,
}

impl DrawScope {
    /// Build a scope from its parts.
    pub fn new(user_id: impl Into<String>, game: impl Into<String>, draw_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            game: game.into(),
            draw_date,
        }
    }
}
