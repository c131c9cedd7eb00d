//! Persistence and remote-lock orchestration around the per-draw submission.
//!
//! Every mutation here works on a clone of the stored crucible so guard
//! rejections leave both the crucible row and the collection store untouched.
//! Where a flow spans two stores, failures are compensated step by step to
//! avoid losing combinations.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::models::{Crucible, DrawScope, UserGameProgress};
use crate::error::ServiceError;
use crate::remote::dto::SubmitPlaycardRequest;
use crate::schedule::Schedule;
use crate::services::require_rule;
use crate::state::SharedState;

/// Stored crucible for the scope, or a fresh unsaved draft.
pub async fn load_or_create(
    state: &SharedState,
    scope: &DrawScope,
) -> Result<Crucible, ServiceError> {
    match state.store().find_crucible(scope.clone()).await? {
        Some(crucible) => Ok(crucible),
        None => Ok(Crucible::new_draft(scope, Utc::now())),
    }
}

/// Editing cutoff for the scope's draw, from the game's schedule and the
/// configured lead.
async fn cutoff_for(
    state: &SharedState,
    scope: &DrawScope,
) -> Result<chrono::DateTime<Utc>, ServiceError> {
    let rule = require_rule(state, &scope.game).await?;
    let schedule = Schedule::parse(&rule.schedule)?;
    schedule
        .cutoff_instant_utc(scope.draw_date, state.config().cutoff_lead())
        .ok_or_else(|| ServiceError::UnusableDrawDate {
            game: scope.game.clone(),
            draw_date: scope.draw_date,
        })
}

/// Move a combination from the collection into the crucible.
pub async fn add_ingot(
    state: &SharedState,
    scope: &DrawScope,
    ingot_id: i64,
) -> Result<Crucible, ServiceError> {
    let rule = require_rule(state, &scope.game).await?;
    let cutoff = cutoff_for(state, scope).await?;
    let now = Utc::now();

    let ingots = state.store().list_ingots(scope.clone()).await?;
    let ingot = ingots
        .into_iter()
        .find(|i| i.id == ingot_id)
        .ok_or_else(|| ServiceError::NotFound(format!("combination {ingot_id} is not in the collection")))?;

    // Run every guard on a working copy before touching either store.
    let mut working = load_or_create(state, scope).await?;
    working.add_ingot(ingot.clone(), rule.regular_count, now, cutoff)?;

    let removed = state.store().remove_ingot(scope.clone(), ingot_id).await?;
    if removed == 0 {
        return Err(ServiceError::NotFound(format!(
            "combination {ingot_id} is not in the collection"
        )));
    }

    if let Err(err) = state.store().upsert_crucible(working.clone()).await {
        // Put the combination back so it is not stranded outside both stores.
        if let Err(restore) = state.store().put_ingot(ingot).await {
            warn!(ingot_id, error = %restore, "failed to restore combination after save failure");
        }
        return Err(err.into());
    }

    Ok(working)
}

/// Swap a collection combination with one already in the crucible.
///
/// On success the incoming item leaves the collection and the displaced one
/// enters it; any step that fails is unwound so neither item is lost.
pub async fn replace_ingot(
    state: &SharedState,
    scope: &DrawScope,
    collection_id: i64,
    crucible_id: i64,
) -> Result<Crucible, ServiceError> {
    let cutoff = cutoff_for(state, scope).await?;
    let now = Utc::now();

    let ingots = state.store().list_ingots(scope.clone()).await?;
    let incoming = ingots
        .into_iter()
        .find(|i| i.id == collection_id)
        .ok_or_else(|| {
            ServiceError::NotFound(format!("combination {collection_id} is not in the collection"))
        })?;

    let mut working = load_or_create(state, scope).await?;
    let displaced = working.swap_ingot(incoming.clone(), crucible_id, now, cutoff)?;

    let removed = state
        .store()
        .remove_ingot(scope.clone(), collection_id)
        .await?;
    if removed == 0 {
        return Err(ServiceError::NotFound(format!(
            "combination {collection_id} is not in the collection"
        )));
    }

    if let Err(err) = state.store().put_ingot(displaced.clone()).await {
        if let Err(restore) = state.store().put_ingot(incoming).await {
            warn!(collection_id, error = %restore, "failed to restore combination after swap failure");
        }
        return Err(err.into());
    }

    if let Err(err) = state.store().upsert_crucible(working.clone()).await {
        if let Err(undo) = state
            .store()
            .remove_ingot(scope.clone(), displaced.id)
            .await
        {
            warn!(displaced_id = displaced.id, error = %undo, "failed to unwind displaced combination");
        }
        if let Err(restore) = state.store().put_ingot(incoming).await {
            warn!(collection_id, error = %restore, "failed to restore combination after save failure");
        }
        return Err(err.into());
    }

    Ok(working)
}

/// Lock in a full crucible with the remote.
///
/// The submitted status is persisted before the remote call so a crash
/// mid-flight never leaves a remotely-locked draw editable locally. A remote
/// failure reverts the row to draft. On success the scope's collection is
/// cleared: the server invalidates unused combinations at lock time.
pub async fn lock(
    state: &SharedState,
    scope: &DrawScope,
    confirmed: bool,
) -> Result<Crucible, ServiceError> {
    let rule = require_rule(state, &scope.game).await?;
    let cutoff = cutoff_for(state, scope).await?;
    let now = Utc::now();

    let mut working = load_or_create(state, scope).await?;
    working.begin_lock(rule.regular_count, confirmed, now, cutoff)?;
    let play_card_id = working.id.get_or_insert_with(Uuid::new_v4).to_string();

    state.store().upsert_crucible(working.clone()).await?;

    let request = SubmitPlaycardRequest {
        user_id: scope.user_id.clone(),
        game_name: scope.game.clone(),
        draw_date: scope.draw_date,
        play_card_id,
        ingot_ids: working.ingots.iter().map(|i| i.id).collect(),
    };

    if let Err(err) = state.api().submit_playcard(request).await {
        working.revert_lock(Utc::now());
        if let Err(persist) = state.store().upsert_crucible(working.clone()).await {
            warn!(
                game = %scope.game,
                error = %persist,
                "failed to persist draft revert after lock failure"
            );
        }
        return Err(err.into());
    }

    info!(
        game = %scope.game,
        draw_date = %scope.draw_date,
        ingots = working.ingots.len(),
        "crucible locked in with the remote"
    );

    let cleared = state.store().clear_ingots(scope.clone()).await?;
    if cleared > 0 {
        info!(cleared, "cleared leftover combinations after lock");
    }

    // Best effort; the lock itself already succeeded.
    if let Err(err) = touch_last_played(state, scope).await {
        warn!(game = %scope.game, error = %err, "failed to update play progress after lock");
    }

    Ok(working)
}

async fn touch_last_played(state: &SharedState, scope: &DrawScope) -> Result<(), ServiceError> {
    let mut progress = state
        .store()
        .find_progress(scope.user_id.clone(), scope.game.clone())
        .await?
        .unwrap_or(UserGameProgress {
            user_id: scope.user_id.clone(),
            game: scope.game.clone(),
            score: 0,
            awards: Vec::new(),
            stats: serde_json::Value::Null,
            last_played: None,
        });
    progress.last_played = Some(Utc::now());
    state.store().upsert_progress(progress).await?;
    Ok(())
}

// Re-export so callers pattern-matching guard rejections need one import.
pub use crate::state::crucible::CrucibleError;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::models::CrucibleStatus;
    use crate::dao::store::Store;
    use crate::services::support::{future_saturday, ingot, signed_in_state, FlakyStore, MockApi};

    fn scope() -> DrawScope {
        DrawScope::new("u1", "golden-7", future_saturday())
    }

    #[tokio::test]
    async fn add_moves_combination_out_of_the_collection() {
        let store = FlakyStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let scope = scope();
        store.put_ingot(ingot(1, scope.draw_date)).await.unwrap();

        let crucible = add_ingot(&state, &scope, 1).await.unwrap();

        assert_eq!(crucible.ingots.len(), 1);
        assert_eq!(crucible.ingots[0].id, 1);
        assert!(store.list_ingots(scope.clone()).await.unwrap().is_empty());
        let stored = store.find_crucible(scope).await.unwrap().unwrap();
        assert_eq!(stored.ingots.len(), 1);
    }

    #[tokio::test]
    async fn add_restores_the_collection_when_the_save_fails() {
        let store = FlakyStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let scope = scope();
        store.put_ingot(ingot(1, scope.draw_date)).await.unwrap();
        store.fail_upsert_crucible(true);

        let err = add_ingot(&state, &scope, 1).await.unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::Storage(_)));

        let collection = store.list_ingots(scope.clone()).await.unwrap();
        assert_eq!(collection.len(), 1, "combination returned to the collection");
        assert!(store.find_crucible(scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_of_unknown_combination_is_rejected_without_side_effects() {
        let store = FlakyStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let scope = scope();

        let err = add_ingot(&state, &scope, 42).await.unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::NotFound(_)));
        assert!(store.find_crucible(scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_with_stale_selection_changes_nothing() {
        let store = FlakyStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let scope = scope();
        store.put_ingot(ingot(1, scope.draw_date)).await.unwrap();
        add_ingot(&state, &scope, 1).await.unwrap();
        store.put_ingot(ingot(10, scope.draw_date)).await.unwrap();

        let err = replace_ingot(&state, &scope, 10, 99).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::Crucible(CrucibleError::IngotNotFound { ingot_id: 99 })
        ));

        let collection = store.list_ingots(scope.clone()).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0].id, 10);
        let stored = store.find_crucible(scope).await.unwrap().unwrap();
        assert_eq!(stored.ingots[0].id, 1);
    }

    #[tokio::test]
    async fn replace_swaps_both_stores() {
        let store = FlakyStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let scope = scope();
        store.put_ingot(ingot(1, scope.draw_date)).await.unwrap();
        add_ingot(&state, &scope, 1).await.unwrap();
        store.put_ingot(ingot(10, scope.draw_date)).await.unwrap();

        let crucible = replace_ingot(&state, &scope, 10, 1).await.unwrap();

        assert_eq!(crucible.ingots[0].id, 10);
        let collection = store.list_ingots(scope.clone()).await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0].id, 1, "displaced combination re-enters the collection");
    }

    async fn fill_crucible(state: &crate::state::SharedState, store: &FlakyStore, scope: &DrawScope) {
        for id in 1..=6 {
            store.put_ingot(ingot(id, scope.draw_date)).await.unwrap();
            add_ingot(state, scope, id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn lock_submits_and_clears_the_collection() {
        let api = MockApi::new();
        let store = FlakyStore::new();
        let state = signed_in_state(api.clone(), Arc::new(store.clone())).await;
        let scope = scope();
        fill_crucible(&state, &store, &scope).await;
        store.put_ingot(ingot(99, scope.draw_date)).await.unwrap();

        let locked = lock(&state, &scope, true).await.unwrap();

        assert_eq!(locked.status, CrucibleStatus::Submitted);
        assert!(locked.id.is_some());
        let submits = api.submits();
        assert_eq!(submits.len(), 1);
        assert_eq!(submits[0].ingot_ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(submits[0].play_card_id, locked.id.unwrap().to_string());
        assert!(
            store.list_ingots(scope.clone()).await.unwrap().is_empty(),
            "leftover combinations are invalidated at lock time"
        );

        let err = lock(&state, &scope, true).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::Crucible(CrucibleError::NotEditable { .. })
        ));
    }

    #[tokio::test]
    async fn failed_lock_reverts_to_an_editable_draft() {
        let api = MockApi::new();
        let store = FlakyStore::new();
        let state = signed_in_state(api.clone(), Arc::new(store.clone())).await;
        let scope = scope();
        fill_crucible(&state, &store, &scope).await;
        store.put_ingot(ingot(99, scope.draw_date)).await.unwrap();
        api.reject_submits(true);

        let err = lock(&state, &scope, true).await.unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::Api(_)));

        let stored = store.find_crucible(scope.clone()).await.unwrap().unwrap();
        assert_eq!(stored.status, CrucibleStatus::Draft);
        assert_eq!(stored.ingots.len(), 6, "list survives the failed lock");
        assert_eq!(
            store.list_ingots(scope).await.unwrap().len(),
            1,
            "collection untouched by the failed lock"
        );
    }

    #[tokio::test]
    async fn failed_replace_save_restores_both_stores() {
        let store = FlakyStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let scope = scope();
        store.put_ingot(ingot(1, scope.draw_date)).await.unwrap();
        add_ingot(&state, &scope, 1).await.unwrap();
        store.put_ingot(ingot(10, scope.draw_date)).await.unwrap();
        store.fail_upsert_crucible(true);

        let err = replace_ingot(&state, &scope, 10, 1).await.unwrap_err();
        assert!(matches!(err, crate::error::ServiceError::Storage(_)));

        let collection = store.list_ingots(scope.clone()).await.unwrap();
        assert_eq!(collection.len(), 1, "swap fully unwound");
        assert_eq!(collection[0].id, 10, "incoming combination back in the collection");
        let stored = store.find_crucible(scope).await.unwrap().unwrap();
        assert_eq!(stored.ingots[0].id, 1, "displaced combination back in place");
    }

    #[tokio::test]
    async fn timed_out_lock_reverts_and_can_be_retried() {
        let api = MockApi::new();
        let store = FlakyStore::new();
        let state = signed_in_state(api.clone(), Arc::new(store.clone())).await;
        let scope = scope();
        fill_crucible(&state, &store, &scope).await;
        api.time_out_submits(true);

        let err = lock(&state, &scope, true).await.unwrap_err();
        assert!(err.is_transient(), "a timeout is retryable, not terminal");

        let stored = store.find_crucible(scope.clone()).await.unwrap().unwrap();
        assert_eq!(stored.status, CrucibleStatus::Draft);
        assert_eq!(stored.ingots.len(), 6);

        api.time_out_submits(false);
        let locked = lock(&state, &scope, true).await.unwrap();
        assert_eq!(locked.status, CrucibleStatus::Submitted);
        assert_eq!(api.submits().len(), 1);
    }

    #[tokio::test]
    async fn lock_requires_confirmation() {
        let api = MockApi::new();
        let store = FlakyStore::new();
        let state = signed_in_state(api.clone(), Arc::new(store.clone())).await;
        let scope = scope();
        fill_crucible(&state, &store, &scope).await;

        let err = lock(&state, &scope, false).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::Crucible(CrucibleError::NotConfirmed)
        ));
        assert!(api.submits().is_empty());
    }

    #[tokio::test]
    async fn lock_updates_play_progress() {
        let api = MockApi::new();
        let store = FlakyStore::new();
        let state = signed_in_state(api.clone(), Arc::new(store.clone())).await;
        let scope = scope();
        fill_crucible(&state, &store, &scope).await;

        lock(&state, &scope, true).await.unwrap();

        let progress = store
            .find_progress("u1".into(), "golden-7".into())
            .await
            .unwrap()
            .unwrap();
        assert!(progress.last_played.is_some());
    }
}
