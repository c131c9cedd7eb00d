//! Shared fakes for service-level tests: a scriptable remote API and a
//! store wrapper with injectable write failures.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use futures::future::BoxFuture;
use reqwest::StatusCode;

use crate::config::AppConfig;
use crate::dao::models::{
    Crucible, DrawInfo, DrawResult, DrawScope, GameRule, Ingot, UserGameProgress,
};
use crate::dao::storage::{StorageError, StorageResult};
use crate::dao::store::memory::MemoryStore;
use crate::dao::store::Store;
use crate::remote::dto::{
    CombinationRequest, CombinationResponse, GameInfoResponse, GameResultResponse, LoginRequest,
    LoginResponse, RegisterRequest, RegisterResponse, SubmitPlaycardRequest,
    SubmitPlaycardResponse,
};
use crate::remote::{ApiError, ApiResult, RemoteApi};
use crate::state::{AppState, Session, SharedState};

/// State over the default config with the built-in rules seeded.
pub(crate) async fn state_with(api: MockApi, store: Arc<dyn Store>) -> SharedState {
    let config = AppConfig::default();
    store
        .seed_game_rules(config.games().to_vec())
        .await
        .unwrap();
    AppState::new(config, store, Arc::new(api))
}

/// Same as [`state_with`] with a session already installed for user `u1`.
pub(crate) async fn signed_in_state(api: MockApi, store: Arc<dyn Store>) -> SharedState {
    let state = state_with(api, store).await;
    state
        .install_session(Session {
            user_id: "u1".into(),
            auth_token: "tok".into(),
        })
        .await;
    state
}

/// A Saturday comfortably in the future, so cutoff guards see an open draw.
pub(crate) fn future_saturday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(30);
    while date.weekday() != Weekday::Sat {
        date = date.succ_opt().unwrap();
    }
    date
}

/// Draw metadata for the built-in game with room left in the quota.
pub(crate) fn open_game_info(draw_date: NaiveDate) -> GameInfoResponse {
    GameInfoResponse {
        draw_date,
        total_combinations: 13_983_816,
        user_request_limit: Some(10),
        user_combinations_requested: Some(0),
        archive_checksum: None,
    }
}

/// A collected combination for user `u1` in the built-in game.
pub(crate) fn ingot(id: i64, draw_date: NaiveDate) -> Ingot {
    Ingot {
        id,
        user_id: "u1".into(),
        game: "golden-7".into(),
        draw_date,
        numbers: vec![1, 2, 3, 4, 5, 6],
        collected_at: Utc::now(),
    }
}

/// Scriptable [`RemoteApi`] fake. Responses are loaded ahead of the test;
/// unset endpoints answer with a 404-shaped status error.
#[derive(Clone, Default)]
pub(crate) struct MockApi {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    game_info: Mutex<Option<GameInfoResponse>>,
    results: Mutex<HashMap<NaiveDate, GameResultResponse>>,
    combinations: Mutex<VecDeque<CombinationResponse>>,
    submit_rejects: AtomicBool,
    submit_times_out: AtomicBool,
    submits: Mutex<Vec<SubmitPlaycardRequest>>,
    game_info_calls: AtomicUsize,
    result_calls: AtomicUsize,
    bearer: Mutex<Option<String>>,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_game_info(&self, response: GameInfoResponse) {
        *self.inner.game_info.lock().unwrap() = Some(response);
    }

    pub(crate) fn set_result(&self, draw_date: NaiveDate, response: GameResultResponse) {
        self.inner.results.lock().unwrap().insert(draw_date, response);
    }

    pub(crate) fn push_combination(&self, response: CombinationResponse) {
        self.inner.combinations.lock().unwrap().push_back(response);
    }

    pub(crate) fn reject_submits(&self, value: bool) {
        self.inner.submit_rejects.store(value, Ordering::SeqCst);
    }

    pub(crate) fn time_out_submits(&self, value: bool) {
        self.inner.submit_times_out.store(value, Ordering::SeqCst);
    }

    pub(crate) fn submits(&self) -> Vec<SubmitPlaycardRequest> {
        self.inner.submits.lock().unwrap().clone()
    }

    pub(crate) fn game_info_calls(&self) -> usize {
        self.inner.game_info_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn result_calls(&self) -> usize {
        self.inner.result_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn bearer(&self) -> Option<String> {
        self.inner.bearer.lock().unwrap().clone()
    }
}

fn not_scripted<T>(path: &str) -> BoxFuture<'static, ApiResult<T>>
where
    T: Send + 'static,
{
    let path = path.to_string();
    Box::pin(async move {
        Err(ApiError::Status {
            path,
            status: StatusCode::NOT_FOUND,
        })
    })
}

impl RemoteApi for MockApi {
    fn login(&self, request: LoginRequest) -> BoxFuture<'static, ApiResult<LoginResponse>> {
        Box::pin(async move {
            Ok(LoginResponse {
                user_id: format!("uid-{}", request.username),
                account_status: "active".into(),
                membership_level: "standard".into(),
                auth_token: "token-1".into(),
                min_app_version: None,
            })
        })
    }

    fn register(
        &self,
        request: RegisterRequest,
    ) -> BoxFuture<'static, ApiResult<RegisterResponse>> {
        Box::pin(async move {
            Ok(RegisterResponse {
                status: "success".into(),
                message: None,
                user_id: Some(format!("uid-{}", request.username)),
                verification_url: None,
            })
        })
    }

    fn game_info(&self, _game: String) -> BoxFuture<'static, ApiResult<GameInfoResponse>> {
        self.inner.game_info_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.inner.game_info.lock().unwrap().clone();
        match scripted {
            Some(response) => Box::pin(async move { Ok(response) }),
            None => not_scripted("/game-info"),
        }
    }

    fn game_result(
        &self,
        _game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, ApiResult<GameResultResponse>> {
        self.inner.result_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.inner.results.lock().unwrap().get(&draw_date).cloned();
        Box::pin(async move {
            // Draws the server has not finalized answer with an empty body,
            // not an error.
            Ok(scripted.unwrap_or(GameResultResponse {
                winning_numbers: Vec::new(),
                bonus_number: None,
                odds: HashMap::new(),
                total_combinations: None,
                score: None,
                win_id: None,
                archive_password: None,
                archive_checksum: None,
            }))
        })
    }

    fn request_combination(
        &self,
        _request: CombinationRequest,
    ) -> BoxFuture<'static, ApiResult<CombinationResponse>> {
        let scripted = self.inner.combinations.lock().unwrap().pop_front();
        match scripted {
            Some(response) => Box::pin(async move { Ok(response) }),
            None => not_scripted("/request-combination"),
        }
    }

    fn submit_playcard(
        &self,
        request: SubmitPlaycardRequest,
    ) -> BoxFuture<'static, ApiResult<SubmitPlaycardResponse>> {
        if self.inner.submit_times_out.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err(ApiError::Timeout {
                    path: "/submit-playcard".into(),
                })
            });
        }
        if self.inner.submit_rejects.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err(ApiError::Rejected {
                    path: "/submit-playcard".into(),
                    message: "draw is closed".into(),
                })
            });
        }
        self.inner.submits.lock().unwrap().push(request);
        Box::pin(async {
            Ok(SubmitPlaycardResponse {
                status: "success".into(),
                message: None,
            })
        })
    }

    fn set_bearer(&self, token: Option<String>) {
        *self.inner.bearer.lock().unwrap() = token;
    }
}

/// [`MemoryStore`] wrapper whose write paths can be made to fail on demand,
/// for exercising the compensation flows.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    store: MemoryStore,
    fail_upsert_crucible: Arc<AtomicBool>,
    fail_put_ingot: Arc<AtomicBool>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_upsert_crucible(&self, value: bool) {
        self.fail_upsert_crucible.store(value, Ordering::SeqCst);
    }

    pub(crate) fn fail_put_ingot(&self, value: bool) {
        self.fail_put_ingot.store(value, Ordering::SeqCst);
    }

    fn injected_failure(operation: &str) -> StorageError {
        StorageError::unavailable(
            format!("injected {operation} failure"),
            std::io::Error::other("injected"),
        )
    }
}

impl Store for FlakyStore {
    fn seed_game_rules(&self, rules: Vec<GameRule>) -> BoxFuture<'static, StorageResult<()>> {
        self.store.seed_game_rules(rules)
    }

    fn game_rule(&self, game: String) -> BoxFuture<'static, StorageResult<Option<GameRule>>> {
        self.store.game_rule(game)
    }

    fn upsert_draw_info(&self, info: DrawInfo) -> BoxFuture<'static, StorageResult<()>> {
        self.store.upsert_draw_info(info)
    }

    fn draw_info(
        &self,
        game: String,
        draw_date: Option<NaiveDate>,
    ) -> BoxFuture<'static, StorageResult<Option<DrawInfo>>> {
        self.store.draw_info(game, draw_date)
    }

    fn put_ingot(&self, ingot: Ingot) -> BoxFuture<'static, StorageResult<()>> {
        if self.fail_put_ingot.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Self::injected_failure("put_ingot")) });
        }
        self.store.put_ingot(ingot)
    }

    fn list_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<Vec<Ingot>>> {
        self.store.list_ingots(scope)
    }

    fn remove_ingot(&self, scope: DrawScope, id: i64) -> BoxFuture<'static, StorageResult<u64>> {
        self.store.remove_ingot(scope, id)
    }

    fn clear_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<u64>> {
        self.store.clear_ingots(scope)
    }

    fn upsert_crucible(&self, crucible: Crucible) -> BoxFuture<'static, StorageResult<()>> {
        if self.fail_upsert_crucible.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Self::injected_failure("upsert_crucible")) });
        }
        self.store.upsert_crucible(crucible)
    }

    fn find_crucible(
        &self,
        scope: DrawScope,
    ) -> BoxFuture<'static, StorageResult<Option<Crucible>>> {
        self.store.find_crucible(scope)
    }

    fn upsert_result(&self, result: DrawResult) -> BoxFuture<'static, StorageResult<()>> {
        self.store.upsert_result(result)
    }

    fn find_result(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<Option<DrawResult>>> {
        self.store.find_result(game, draw_date)
    }

    fn mark_result_seen(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        self.store.mark_result_seen(game, draw_date)
    }

    fn any_unseen_results(&self) -> BoxFuture<'static, StorageResult<bool>> {
        self.store.any_unseen_results()
    }

    fn upsert_progress(&self, progress: UserGameProgress) -> BoxFuture<'static, StorageResult<()>> {
        self.store.upsert_progress(progress)
    }

    fn find_progress(
        &self,
        user_id: String,
        game: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserGameProgress>>> {
        self.store.find_progress(user_id, game)
    }

    fn followed_games(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        self.store.followed_games(user_id)
    }

    fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.store.close()
    }
}
