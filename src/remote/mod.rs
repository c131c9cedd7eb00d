//! Typed client for the backend HTTP API.

pub mod dto;
mod error;
mod http;

use chrono::NaiveDate;
use futures::future::BoxFuture;

pub use error::{ApiError, ApiResult};
pub use http::HttpApi;

use dto::{
    CombinationRequest, CombinationResponse, GameInfoResponse, GameResultResponse, LoginRequest,
    LoginResponse, RegisterRequest, RegisterResponse, SubmitPlaycardRequest,
    SubmitPlaycardResponse,
};

/// Abstraction over the remote backend, decoded into typed responses at the
/// boundary so no raw JSON value crosses into the engine.
pub trait RemoteApi: Send + Sync {
    /// Exchange credentials for a session.
    fn login(&self, request: LoginRequest) -> BoxFuture<'static, ApiResult<LoginResponse>>;
    /// Create a new account.
    fn register(&self, request: RegisterRequest)
    -> BoxFuture<'static, ApiResult<RegisterResponse>>;
    /// Fetch next-draw metadata for a game.
    fn game_info(&self, game: String) -> BoxFuture<'static, ApiResult<GameInfoResponse>>;
    /// Fetch the (possibly not yet finalized) result of one draw.
    fn game_result(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, ApiResult<GameResultResponse>>;
    /// Request a server-assigned combination against the user's quota.
    fn request_combination(
        &self,
        request: CombinationRequest,
    ) -> BoxFuture<'static, ApiResult<CombinationResponse>>;
    /// Lock in a full crucible for a draw. Idempotent per `play_card_id`.
    fn submit_playcard(
        &self,
        request: SubmitPlaycardRequest,
    ) -> BoxFuture<'static, ApiResult<SubmitPlaycardResponse>>;
    /// Install or clear the bearer token used for authenticated calls.
    fn set_bearer(&self, token: Option<String>);
}
