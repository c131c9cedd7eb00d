//! Durable cache of finalized (and placeholder) draw results.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::dao::models::DrawResult;
use crate::error::ServiceError;
use crate::remote::dto::GameResultResponse;
use crate::state::SharedState;

/// Build a cache row from a remote payload.
///
/// A row with winning numbers is flagged unseen; a row without them is a
/// placeholder for a draw that has not been finalized yet.
pub fn from_remote(game: &str, draw_date: NaiveDate, response: GameResultResponse) -> DrawResult {
    let is_new = !response.winning_numbers.is_empty();
    DrawResult {
        game: game.to_string(),
        draw_date,
        winning_numbers: response.winning_numbers,
        bonus_number: response.bonus_number,
        odds: response.odds,
        is_new,
        win_id: response.win_id,
        archive_password: response.archive_password,
        archive_checksum: response.archive_checksum,
        fetched_at: Utc::now(),
    }
}

/// Placeholder row for a draw whose result has not arrived yet.
pub fn placeholder(game: &str, draw_date: NaiveDate) -> DrawResult {
    DrawResult {
        game: game.to_string(),
        draw_date,
        winning_numbers: Vec::new(),
        bonus_number: None,
        odds: Default::default(),
        is_new: false,
        win_id: None,
        archive_password: None,
        archive_checksum: None,
        fetched_at: Utc::now(),
    }
}

/// Fetch one draw's result from the remote and cache it.
pub async fn cache_remote(
    state: &SharedState,
    game: &str,
    draw_date: NaiveDate,
) -> Result<DrawResult, ServiceError> {
    let response = state.api().game_result(game.to_string(), draw_date).await?;
    let result = from_remote(game, draw_date, response);
    state.store().upsert_result(result.clone()).await?;
    Ok(result)
}

/// Replace the cached row for a draw.
pub async fn upsert(state: &SharedState, result: DrawResult) -> Result<(), ServiceError> {
    Ok(state.store().upsert_result(result).await?)
}

/// Cached result for one draw, if any.
pub async fn get(
    state: &SharedState,
    game: &str,
    draw_date: NaiveDate,
) -> Result<Option<DrawResult>, ServiceError> {
    Ok(state.store().find_result(game.to_string(), draw_date).await?)
}

/// Mark a cached result as viewed. Idempotent; marking an absent or
/// already-seen row changes nothing.
pub async fn mark_seen(
    state: &SharedState,
    game: &str,
    draw_date: NaiveDate,
) -> Result<(), ServiceError> {
    let changed = state
        .store()
        .mark_result_seen(game.to_string(), draw_date)
        .await?;
    if changed == 0 {
        debug!(game, %draw_date, "mark-seen had nothing to change");
    }
    Ok(())
}

/// Whether any cached result across all games is still unseen.
pub async fn any_unseen(state: &SharedState) -> Result<bool, ServiceError> {
    Ok(state.store().any_unseen_results().await?)
}
