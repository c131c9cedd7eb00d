//! In-memory store backend used by tests and as a non-durable fallback.

use chrono::NaiveDate;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::dao::models::{
    Crucible, DrawInfo, DrawResult, DrawScope, GameRule, Ingot, UserGameProgress,
};
use crate::dao::storage::StorageResult;
use crate::dao::store::Store;

/// Map-backed [`Store`] implementation with the same upsert semantics as the
/// durable backend. Cheap to clone; all clones share the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Maps>,
}

#[derive(Default)]
struct Maps {
    rules: DashMap<String, GameRule>,
    draw_info: DashMap<(String, NaiveDate), DrawInfo>,
    ingots: DashMap<i64, Ingot>,
    crucibles: DashMap<(String, String, NaiveDate), Crucible>,
    results: DashMap<(String, NaiveDate), DrawResult>,
    progress: DashMap<(String, String), UserGameProgress>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn scope_matches(ingot: &Ingot, scope: &DrawScope) -> bool {
        ingot.user_id == scope.user_id
            && ingot.game == scope.game
            && ingot.draw_date == scope.draw_date
    }
}

impl Store for MemoryStore {
    fn seed_game_rules(&self, rules: Vec<GameRule>) -> BoxFuture<'static, StorageResult<()>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            for rule in rules {
                maps.rules.insert(rule.game.clone(), rule);
            }
            Ok(())
        })
    }

    fn game_rule(&self, game: String) -> BoxFuture<'static, StorageResult<Option<GameRule>>> {
        let maps = self.inner.clone();
        Box::pin(async move { Ok(maps.rules.get(&game).map(|r| r.clone())) })
    }

    fn upsert_draw_info(&self, info: DrawInfo) -> BoxFuture<'static, StorageResult<()>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            maps.draw_info
                .insert((info.game.clone(), info.draw_date), info);
            Ok(())
        })
    }

    fn draw_info(
        &self,
        game: String,
        draw_date: Option<NaiveDate>,
    ) -> BoxFuture<'static, StorageResult<Option<DrawInfo>>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            match draw_date {
                Some(date) => Ok(maps.draw_info.get(&(game, date)).map(|i| i.clone())),
                None => Ok(maps
                    .draw_info
                    .iter()
                    .filter(|entry| entry.key().0 == game)
                    .max_by_key(|entry| entry.key().1)
                    .map(|entry| entry.value().clone())),
            }
        })
    }

    fn put_ingot(&self, ingot: Ingot) -> BoxFuture<'static, StorageResult<()>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            maps.ingots.insert(ingot.id, ingot);
            Ok(())
        })
    }

    fn list_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<Vec<Ingot>>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let mut items: Vec<Ingot> = maps
                .ingots
                .iter()
                .filter(|entry| Self::scope_matches(entry.value(), &scope))
                .map(|entry| entry.value().clone())
                .collect();
            items.sort_by(|a, b| {
                b.collected_at
                    .cmp(&a.collected_at)
                    .then_with(|| b.id.cmp(&a.id))
            });
            Ok(items)
        })
    }

    fn remove_ingot(&self, scope: DrawScope, id: i64) -> BoxFuture<'static, StorageResult<u64>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let removed = maps
                .ingots
                .remove_if(&id, |_, ingot| Self::scope_matches(ingot, &scope));
            Ok(u64::from(removed.is_some()))
        })
    }

    fn clear_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<u64>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let ids: Vec<i64> = maps
                .ingots
                .iter()
                .filter(|entry| Self::scope_matches(entry.value(), &scope))
                .map(|entry| *entry.key())
                .collect();
            let mut removed = 0;
            for id in ids {
                if maps.ingots.remove(&id).is_some() {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    fn upsert_crucible(&self, crucible: Crucible) -> BoxFuture<'static, StorageResult<()>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let key = (
                crucible.user_id.clone(),
                crucible.game.clone(),
                crucible.draw_date,
            );
            maps.crucibles.insert(key, crucible);
            Ok(())
        })
    }

    fn find_crucible(
        &self,
        scope: DrawScope,
    ) -> BoxFuture<'static, StorageResult<Option<Crucible>>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let key = (scope.user_id, scope.game, scope.draw_date);
            Ok(maps.crucibles.get(&key).map(|c| c.clone()))
        })
    }

    fn upsert_result(&self, result: DrawResult) -> BoxFuture<'static, StorageResult<()>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            maps.results
                .insert((result.game.clone(), result.draw_date), result);
            Ok(())
        })
    }

    fn find_result(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<Option<DrawResult>>> {
        let maps = self.inner.clone();
        Box::pin(async move { Ok(maps.results.get(&(game, draw_date)).map(|r| r.clone())) })
    }

    fn mark_result_seen(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            match maps.results.get_mut(&(game, draw_date)) {
                Some(mut result) if result.is_new => {
                    result.is_new = false;
                    Ok(1)
                }
                _ => Ok(0),
            }
        })
    }

    fn any_unseen_results(&self) -> BoxFuture<'static, StorageResult<bool>> {
        let maps = self.inner.clone();
        Box::pin(async move { Ok(maps.results.iter().any(|entry| entry.value().is_new)) })
    }

    fn upsert_progress(&self, progress: UserGameProgress) -> BoxFuture<'static, StorageResult<()>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let key = (progress.user_id.clone(), progress.game.clone());
            maps.progress.insert(key, progress);
            Ok(())
        })
    }

    fn find_progress(
        &self,
        user_id: String,
        game: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserGameProgress>>> {
        let maps = self.inner.clone();
        Box::pin(async move { Ok(maps.progress.get(&(user_id, game)).map(|p| p.clone())) })
    }

    fn followed_games(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let maps = self.inner.clone();
        Box::pin(async move {
            let mut games: Vec<String> = maps
                .progress
                .iter()
                .filter(|entry| entry.key().0 == user_id)
                .map(|entry| entry.key().1.clone())
                .collect();
            games.sort();
            Ok(games)
        })
    }

    fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
