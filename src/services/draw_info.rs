//! Next-draw metadata: remote refresh plus the two-level local cache.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::dao::models::DrawInfo;
use crate::error::ServiceError;
use crate::state::SharedState;

/// Fetch fresh draw metadata from the remote and cache it.
///
/// The used-count is clamped to never move backwards within a draw: the
/// remote occasionally serves a stale snapshot, and a lower count would make
/// the quota look more generous than it is.
pub async fn refresh(state: &SharedState, game: &str) -> Result<DrawInfo, ServiceError> {
    let response = state.api().game_info(game.to_string()).await?;
    let now = Utc::now();

    let existing = state
        .store()
        .draw_info(game.to_string(), Some(response.draw_date))
        .await?;

    let mut requests_used = response.user_combinations_requested;
    if let Some(prior) = existing.as_ref().and_then(|info| info.requests_used) {
        let incoming = requests_used.unwrap_or(0);
        if prior > incoming {
            debug!(
                game,
                prior, incoming, "remote reported a lower used-count; keeping the higher value"
            );
            requests_used = Some(prior);
        }
    }

    let info = DrawInfo {
        game: game.to_string(),
        draw_date: response.draw_date,
        total_combinations: response.total_combinations,
        request_limit: response.user_request_limit,
        requests_used,
        archive_checksum: response.archive_checksum,
        updated_at: now,
    };

    state.store().upsert_draw_info(info.clone()).await?;
    state.remember_draw_date(game, info.draw_date, now);
    Ok(info)
}

/// Current draw metadata for a game, preferring local caches.
///
/// Resolution order: the in-memory date hint (verified against the durable
/// row), then the most recent durable row, then a remote refresh. `force`
/// skips straight to the refresh.
pub async fn current(
    state: &SharedState,
    game: &str,
    force: bool,
) -> Result<DrawInfo, ServiceError> {
    if force {
        return refresh(state, game).await;
    }

    if let Some(date) = state.cached_draw_date(game, Utc::now()) {
        match state.store().draw_info(game.to_string(), Some(date)).await? {
            Some(info) => return Ok(info),
            None => {
                // Hint points at a row that no longer exists; drop it.
                state.forget_draw_date(game);
            }
        }
    }

    if let Some(info) = state.store().draw_info(game.to_string(), None).await? {
        state.remember_draw_date(game, info.draw_date, Utc::now());
        return Ok(info);
    }

    refresh(state, game).await
}

/// Cached draw metadata without touching the remote. `draw_date` of `None`
/// selects the most recent row.
pub async fn cached(
    state: &SharedState,
    game: &str,
    draw_date: Option<NaiveDate>,
) -> Result<Option<DrawInfo>, ServiceError> {
    Ok(state.store().draw_info(game.to_string(), draw_date).await?)
}

/// Persist the authoritative post-request used-count returned by the
/// combination endpoint.
pub async fn record_quota_use(
    state: &SharedState,
    info: &DrawInfo,
    server_used_count: u32,
) -> Result<(), ServiceError> {
    let mut updated = info.clone();
    updated.requests_used = Some(server_used_count);
    updated.updated_at = Utc::now();
    state.store().upsert_draw_info(updated).await?;
    Ok(())
}
