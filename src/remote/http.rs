use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};

use super::dto::{
    CombinationRequest, CombinationResponse, GameInfoResponse, GameResultResponse, LoginRequest,
    LoginResponse, RegisterRequest, RegisterResponse, SubmitPlaycardRequest,
    SubmitPlaycardResponse,
};
use super::error::{ApiError, ApiResult};
use super::RemoteApi;

/// Reqwest-backed [`RemoteApi`] implementation.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Arc<str>,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpApi {
    /// Build a client against `base_url` with a per-request deadline.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: Arc::new(RwLock::new(None)),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        let token = self.token.read().expect("token lock poisoned").clone();
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<R>(builder: RequestBuilder, path: &str) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let response = builder.send().await.map_err(|source| {
            if source.is_timeout() {
                ApiError::Timeout {
                    path: path.to_string(),
                }
            } else {
                ApiError::Transport {
                    path: path.to_string(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
            });
        }

        response.json::<R>().await.map_err(|source| {
            if source.is_timeout() {
                ApiError::Timeout {
                    path: path.to_string(),
                }
            } else {
                ApiError::Decode {
                    path: path.to_string(),
                    source,
                }
            }
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path).json(body);
        Self::execute(builder, path).await
    }
}

impl RemoteApi for HttpApi {
    fn login(&self, request: LoginRequest) -> BoxFuture<'static, ApiResult<LoginResponse>> {
        let api = self.clone();
        Box::pin(async move { api.post_json("login", &request).await })
    }

    fn register(
        &self,
        request: RegisterRequest,
    ) -> BoxFuture<'static, ApiResult<RegisterResponse>> {
        let api = self.clone();
        Box::pin(async move { api.post_json("register", &request).await })
    }

    fn game_info(&self, game: String) -> BoxFuture<'static, ApiResult<GameInfoResponse>> {
        let api = self.clone();
        Box::pin(async move {
            const PATH: &str = "game-info";
            let builder = api
                .request(Method::GET, PATH)
                .query(&[("game_name", game.as_str())]);
            Self::execute(builder, PATH).await
        })
    }

    fn game_result(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, ApiResult<GameResultResponse>> {
        let api = self.clone();
        Box::pin(async move {
            const PATH: &str = "game-result";
            let builder = api.request(Method::GET, PATH).query(&[
                ("game_name", game.as_str()),
                ("draw_date", &draw_date.format("%Y-%m-%d").to_string()),
            ]);
            Self::execute(builder, PATH).await
        })
    }

    fn request_combination(
        &self,
        request: CombinationRequest,
    ) -> BoxFuture<'static, ApiResult<CombinationResponse>> {
        let api = self.clone();
        Box::pin(async move { api.post_json("request-combination", &request).await })
    }

    fn submit_playcard(
        &self,
        request: SubmitPlaycardRequest,
    ) -> BoxFuture<'static, ApiResult<SubmitPlaycardResponse>> {
        let api = self.clone();
        Box::pin(async move {
            const PATH: &str = "submit-playcard";
            let response: SubmitPlaycardResponse = api.post_json(PATH, &request).await?;
            // A 2xx envelope can still carry a failure verdict; treat it the
            // same as a rejected request.
            if !response.is_success() {
                return Err(ApiError::Rejected {
                    path: PATH.to_string(),
                    message: response
                        .message
                        .unwrap_or_else(|| format!("status `{}`", response.status)),
                });
            }
            Ok(response)
        })
    }

    fn set_bearer(&self, token: Option<String>) {
        *self.token.write().expect("token lock poisoned") = token;
    }
}
