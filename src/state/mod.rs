//! Shared engine state: injected capabilities, session, and caches.

pub mod crucible;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::config::AppConfig;
use crate::dao::store::Store;
use crate::remote::RemoteApi;
use crate::services::sync::PollerHandle;

/// Shared handle to the engine state, cloned across tasks.
pub type SharedState = Arc<AppState>;

/// How long an in-memory next-draw-date entry is trusted before the durable
/// cache is consulted again.
const DRAW_DATE_TTL_SECS: i64 = 300;

/// The signed-in user's identity, installed after a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    /// Server-side user identifier.
    pub user_id: String,
    /// Bearer token for authenticated calls.
    pub auth_token: String,
}

struct CachedDrawDate {
    date: NaiveDate,
    cached_at: DateTime<Utc>,
}

/// Central engine state owning the injected store and API capabilities.
///
/// Constructed once at the process entry point; components receive it by
/// reference instead of reaching for globals.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn Store>,
    api: Arc<dyn RemoteApi>,
    session: RwLock<Option<Session>>,
    // Short-TTL read-through layer over the durable draw-info cache. The
    // durable row stays the single source of truth; entries here are only a
    // hint that must be re-verified against it.
    draw_dates: DashMap<String, CachedDrawDate>,
    poller: Mutex<Option<PollerHandle>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    pub fn new(config: AppConfig, store: Arc<dyn Store>, api: Arc<dyn RemoteApi>) -> SharedState {
        Arc::new(Self {
            config,
            store,
            api,
            session: RwLock::new(None),
            draw_dates: DashMap::new(),
            poller: Mutex::new(None),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the local store.
    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Handle to the remote API client.
    pub fn api(&self) -> Arc<dyn RemoteApi> {
        self.api.clone()
    }

    /// Install a session after a successful login and arm the bearer token.
    pub async fn install_session(&self, session: Session) {
        self.api.set_bearer(Some(session.auth_token.clone()));
        let mut guard = self.session.write().await;
        *guard = Some(session);
    }

    /// Drop the session and disarm the bearer token.
    pub async fn clear_session(&self) {
        self.api.set_bearer(None);
        let mut guard = self.session.write().await;
        guard.take();
    }

    /// Identifier of the signed-in user, if any.
    pub async fn current_user(&self) -> Option<String> {
        let guard = self.session.read().await;
        guard.as_ref().map(|s| s.user_id.clone())
    }

    /// Whether a user is currently signed in.
    pub async fn is_signed_in(&self) -> bool {
        let guard = self.session.read().await;
        guard.is_some()
    }

    /// Fresh in-memory next-draw-date hint for a game, if any.
    pub fn cached_draw_date(&self, game: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
        let entry = self.draw_dates.get(game)?;
        if now - entry.cached_at > Duration::seconds(DRAW_DATE_TTL_SECS) {
            return None;
        }
        Some(entry.date)
    }

    /// Remember the next draw date for a game.
    pub fn remember_draw_date(&self, game: &str, date: NaiveDate, now: DateTime<Utc>) {
        self.draw_dates.insert(
            game.to_string(),
            CachedDrawDate {
                date,
                cached_at: now,
            },
        );
    }

    /// Invalidate the in-memory hint for a game.
    pub fn forget_draw_date(&self, game: &str) {
        self.draw_dates.remove(game);
    }

    /// Slot holding the single result poller of this engine instance.
    pub(crate) fn poller(&self) -> &Mutex<Option<PollerHandle>> {
        &self.poller
    }
}
