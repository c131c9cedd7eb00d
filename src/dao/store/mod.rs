//! Persistence abstraction over the local relational cache.

pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use chrono::NaiveDate;
use futures::future::BoxFuture;

use crate::dao::models::{Crucible, DrawInfo, DrawResult, DrawScope, GameRule, Ingot, UserGameProgress};
use crate::dao::storage::StorageResult;

/// Abstraction over the durable local cache backing the engine.
///
/// All upserts are last-write-wins on their natural primary key. Callers are
/// expected to serialize mutations within one (user, game, draw date) scope;
/// the store itself only guarantees that individual operations are atomic.
pub trait Store: Send + Sync {
    /// Seed the immutable per-game rules. Existing rows are replaced.
    fn seed_game_rules(&self, rules: Vec<GameRule>) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up the rule for one game.
    fn game_rule(&self, game: String) -> BoxFuture<'static, StorageResult<Option<GameRule>>>;

    /// Replace the draw-info row keyed by (game, draw date).
    fn upsert_draw_info(&self, info: DrawInfo) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch draw info for a specific date, or the most recent row when
    /// `draw_date` is `None`.
    fn draw_info(
        &self,
        game: String,
        draw_date: Option<NaiveDate>,
    ) -> BoxFuture<'static, StorageResult<Option<DrawInfo>>>;

    /// Upsert a collected item by its server id.
    fn put_ingot(&self, ingot: Ingot) -> BoxFuture<'static, StorageResult<()>>;
    /// List collected items in the scope, most recently added first.
    fn list_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<Vec<Ingot>>>;
    /// Delete one collected item; returns the number of rows removed.
    fn remove_ingot(&self, scope: DrawScope, id: i64) -> BoxFuture<'static, StorageResult<u64>>;
    /// Delete every collected item in the scope; returns the number removed.
    fn clear_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<u64>>;

    /// Replace the crucible for its (user, game, draw date) scope.
    fn upsert_crucible(&self, crucible: Crucible) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the crucible for the scope, if one was ever saved.
    fn find_crucible(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<Option<Crucible>>>;

    /// Replace the result row keyed by (game, draw date).
    fn upsert_result(&self, result: DrawResult) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the cached result for one draw.
    fn find_result(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<Option<DrawResult>>>;
    /// Clear the unseen flag when set; returns the number of rows changed
    /// (0 means already clear or absent, which is not an error).
    fn mark_result_seen(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Whether any cached result across all games is still unseen.
    fn any_unseen_results(&self) -> BoxFuture<'static, StorageResult<bool>>;

    /// Replace the progress row keyed by (user, game).
    fn upsert_progress(&self, progress: UserGameProgress) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch the progress row for one (user, game) pair.
    fn find_progress(
        &self,
        user_id: String,
        game: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserGameProgress>>>;
    /// Games the user has progress rows for, i.e. the games they follow.
    fn followed_games(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<String>>>;

    /// Release backend resources. Further calls may fail.
    fn close(&self) -> BoxFuture<'static, StorageResult<()>>;
}
