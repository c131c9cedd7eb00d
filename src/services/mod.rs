//! Engine operations, implemented as free functions over [`SharedState`].
//!
//! [`SharedState`]: crate::state::SharedState

pub mod collection;
pub mod crucible;
pub mod draw_info;
pub mod results;
pub mod sync;

#[cfg(test)]
pub(crate) mod support;

use crate::dao::models::GameRule;
use crate::error::ServiceError;
use crate::state::SharedState;

/// Look up the seeded rule for a game, failing when the game is unknown.
pub(crate) async fn require_rule(
    state: &SharedState,
    game: &str,
) -> Result<GameRule, ServiceError> {
    state
        .store()
        .game_rule(game.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no rule seeded for game `{game}`")))
}
