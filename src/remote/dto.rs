//! Wire shapes exchanged with the backend, decoded at the HTTP boundary.
//!
//! Fields that downstream logic cannot proceed without (e.g.
//! `user_requests_count`) are deliberately non-optional so a malformed
//! response fails the whole operation at decode time instead of leaking an
//! untyped value inward.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Credentials sent to `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Successful `POST /login` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Server-side user identifier.
    pub user_id: String,
    /// Account status label.
    pub account_status: String,
    /// Membership tier label.
    pub membership_level: String,
    /// Bearer token for subsequent calls.
    pub auth_token: String,
    /// Minimum client version the backend still supports.
    pub min_app_version: Option<String>,
}

/// Profile fields sent to `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    /// Desired account name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Contact email address.
    pub email: String,
}

/// `POST /register` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Outcome label reported by the backend.
    pub status: String,
    /// Human-readable outcome message.
    pub message: Option<String>,
    /// Created user identifier, on success.
    pub user_id: Option<String>,
    /// Verification link to present to the user, when required.
    pub verification_url: Option<String>,
}

/// `GET /game-info` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GameInfoResponse {
    /// Next draw date for the game.
    pub draw_date: NaiveDate,
    /// Total size of the combination space.
    pub total_combinations: u64,
    /// Per-user request limit.
    pub user_request_limit: Option<u32>,
    /// Requests the user has already consumed.
    pub user_combinations_requested: Option<u32>,
    /// Opaque integrity token for the combination pool.
    pub archive_checksum: Option<String>,
}

/// `GET /game-result` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct GameResultResponse {
    /// Winning numbers; absent or empty until the draw is finalized.
    #[serde(default)]
    pub winning_numbers: Vec<u32>,
    /// Bonus number, when drawn.
    pub bonus_number: Option<u32>,
    /// Per-tier odds as decimals.
    #[serde(default)]
    pub odds: HashMap<String, f64>,
    /// Total size of the combination space.
    pub total_combinations: Option<u64>,
    /// Score awarded to the user for this draw.
    pub score: Option<i64>,
    /// Win/claim identifier, when the user won something.
    pub win_id: Option<String>,
    /// Opaque archive password issued with finalized results.
    pub archive_password: Option<String>,
    /// Opaque archive checksum issued with finalized results.
    pub archive_checksum: Option<String>,
}

/// Body of `POST /request-combination`.
#[derive(Debug, Clone, Serialize)]
pub struct CombinationRequest {
    /// Game identifier.
    pub game_name: String,
    /// Draw the combination targets.
    pub draw_date: NaiveDate,
    /// How many numbers the combination must contain.
    pub combination_number: u32,
}

/// `POST /request-combination` payload. The server is authoritative for the
/// post-request used-count, returned here synchronously.
#[derive(Debug, Clone, Deserialize)]
pub struct CombinationResponse {
    /// Server-issued identity of the new combination.
    pub combination_sequence_id: i64,
    /// The assigned combination.
    pub combination_numbers: Vec<u32>,
    /// Authoritative post-request used-count.
    pub user_requests_count: u32,
}

/// Body of `POST /submit-playcard`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitPlaycardRequest {
    /// Owning user.
    pub user_id: String,
    /// Game identifier.
    pub game_name: String,
    /// Draw the submission targets.
    pub draw_date: NaiveDate,
    /// Client-assigned crucible identifier; makes the lock call idempotent.
    pub play_card_id: String,
    /// Ids of the combinations being locked in.
    pub ingot_ids: Vec<i64>,
}

/// `POST /submit-playcard` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPlaycardResponse {
    /// Outcome label; anything other than a success value fails the lock.
    pub status: String,
    /// Human-readable outcome message.
    pub message: Option<String>,
}

impl SubmitPlaycardResponse {
    /// Whether the embedded status field reports success.
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success") || self.status.eq_ignore_ascii_case("ok")
    }
}
