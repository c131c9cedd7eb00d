//! The collection of requested-but-uncommitted combinations.

use chrono::Utc;
use tracing::{debug, warn};

use crate::dao::models::{DrawScope, Ingot};
use crate::error::ServiceError;
use crate::quota::Quota;
use crate::remote::dto::CombinationRequest;
use crate::services::{draw_info, require_rule};
use crate::state::SharedState;

/// Request a fresh combination from the remote and add it to the collection.
///
/// The quota gate runs against the cached draw info before the remote call;
/// the server remains the authority and its post-request used-count is
/// mirrored back into the cache afterwards.
pub async fn request_ingot(state: &SharedState, game: &str) -> Result<Ingot, ServiceError> {
    let user_id = state
        .current_user()
        .await
        .ok_or(ServiceError::NotSignedIn)?;
    let rule = require_rule(state, game).await?;
    let info = draw_info::current(state, game, false).await?;

    let quota = Quota::from_draw_info(&info);
    if quota.exhausted() {
        return Err(ServiceError::QuotaExhausted {
            limit: quota.limit.unwrap_or(0),
        });
    }

    let response = state
        .api()
        .request_combination(CombinationRequest {
            game_name: game.to_string(),
            draw_date: info.draw_date,
            combination_number: rule.regular_count,
        })
        .await?;

    let ingot = Ingot {
        id: response.combination_sequence_id,
        user_id,
        game: game.to_string(),
        draw_date: info.draw_date,
        numbers: response.combination_numbers,
        collected_at: Utc::now(),
    };

    // Quota was consumed on the server the moment the call succeeded. If the
    // local write fails the item is lost to this device; surfacing the
    // storage error is still the honest outcome.
    if let Err(err) = state.store().put_ingot(ingot.clone()).await {
        warn!(
            game,
            ingot_id = ingot.id,
            error = %err,
            "combination obtained but could not be stored locally"
        );
        return Err(err.into());
    }

    draw_info::record_quota_use(state, &info, response.user_requests_count).await?;
    Ok(ingot)
}

/// Collected combinations in the scope, most recently added first.
pub async fn list(state: &SharedState, scope: DrawScope) -> Result<Vec<Ingot>, ServiceError> {
    Ok(state.store().list_ingots(scope).await?)
}

/// Drop one combination from the collection. Removing an absent item is a
/// no-op; quota is never refunded.
pub async fn discard(
    state: &SharedState,
    scope: DrawScope,
    ingot_id: i64,
) -> Result<(), ServiceError> {
    let removed = state.store().remove_ingot(scope, ingot_id).await?;
    if removed == 0 {
        debug!(ingot_id, "discard targeted an absent combination");
    }
    Ok(())
}

/// Drop every combination in the scope; returns how many were removed.
pub async fn clear(state: &SharedState, scope: DrawScope) -> Result<u64, ServiceError> {
    Ok(state.store().clear_ingots(scope).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::store::memory::MemoryStore;
    use crate::dao::store::Store;
    use crate::remote::dto::CombinationResponse;
    use crate::services::support::{
        future_saturday, ingot, open_game_info, signed_in_state, state_with, FlakyStore, MockApi,
    };

    #[tokio::test]
    async fn request_stores_the_combination_and_mirrors_the_quota() {
        let api = MockApi::new();
        let draw_date = future_saturday();
        api.set_game_info(open_game_info(draw_date));
        api.push_combination(CombinationResponse {
            combination_sequence_id: 41,
            combination_numbers: vec![3, 9, 17, 22, 30, 48],
            user_requests_count: 1,
        });
        let store = MemoryStore::new();
        let state = signed_in_state(api, Arc::new(store.clone())).await;

        let obtained = request_ingot(&state, "golden-7").await.unwrap();

        assert_eq!(obtained.id, 41);
        assert_eq!(obtained.draw_date, draw_date);
        let scope = DrawScope::new("u1", "golden-7", draw_date);
        assert_eq!(store.list_ingots(scope).await.unwrap().len(), 1);
        let info = store
            .draw_info("golden-7".into(), Some(draw_date))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.requests_used, Some(1));
    }

    #[tokio::test]
    async fn request_is_rejected_when_the_quota_is_exhausted() {
        let api = MockApi::new();
        let draw_date = future_saturday();
        let mut info = open_game_info(draw_date);
        info.user_request_limit = Some(3);
        info.user_combinations_requested = Some(3);
        api.set_game_info(info);
        let state = signed_in_state(api, Arc::new(MemoryStore::new())).await;

        let err = request_ingot(&state, "golden-7").await.unwrap_err();
        assert!(matches!(err, ServiceError::QuotaExhausted { limit: 3 }));
    }

    #[tokio::test]
    async fn request_surfaces_a_failed_local_write_as_an_error() {
        let api = MockApi::new();
        let draw_date = future_saturday();
        api.set_game_info(open_game_info(draw_date));
        api.push_combination(CombinationResponse {
            combination_sequence_id: 41,
            combination_numbers: vec![3, 9, 17, 22, 30, 48],
            user_requests_count: 1,
        });
        let store = FlakyStore::new();
        let state = signed_in_state(api, Arc::new(store.clone())).await;
        store.fail_put_ingot(true);

        // The server granted the combination, so the quota is consumed
        // remotely; losing the local copy must not be papered over.
        let err = request_ingot(&state, "golden-7").await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));

        let scope = DrawScope::new("u1", "golden-7", draw_date);
        assert!(state.store().list_ingots(scope).await.unwrap().is_empty());
        let info = state
            .store()
            .draw_info("golden-7".into(), Some(draw_date))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            info.requests_used,
            Some(0),
            "used-count mirror is skipped when the item was lost"
        );
    }

    #[tokio::test]
    async fn request_requires_a_session() {
        let state = state_with(MockApi::new(), Arc::new(MemoryStore::new())).await;
        let err = request_ingot(&state, "golden-7").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotSignedIn));
    }

    #[tokio::test]
    async fn discard_of_an_absent_combination_is_a_noop() {
        let store = MemoryStore::new();
        let state = signed_in_state(MockApi::new(), Arc::new(store.clone())).await;
        let draw_date = future_saturday();
        let scope = DrawScope::new("u1", "golden-7", draw_date);
        store.put_ingot(ingot(7, draw_date)).await.unwrap();

        discard(&state, scope.clone(), 999).await.unwrap();
        assert_eq!(list(&state, scope).await.unwrap().len(), 1);
    }
}
