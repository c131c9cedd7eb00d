//! Sign-in synchronization and the background result poller.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dao::models::DrawScope;
use crate::error::ServiceError;
use crate::remote::dto::LoginRequest;
use crate::schedule::Schedule;
use crate::services::{draw_info, require_rule, results};
use crate::state::{Session, SharedState};

/// Whether the result of the draw at `draw_instant` should be available.
///
/// Results are published overnight; polling before noon (in `zone`) of the
/// day after the draw only burns requests on placeholder responses.
pub fn results_expected<Z: TimeZone>(
    draw_instant: DateTime<Utc>,
    now: DateTime<Utc>,
    zone: &Z,
) -> bool {
    let draw_local = draw_instant.with_timezone(zone);
    let Some(available_naive) = draw_local
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(12, 0, 0))
    else {
        return false;
    };
    let Some(available) = zone.from_local_datetime(&available_naive).earliest() else {
        return false;
    };
    now >= available.with_timezone(&Utc)
}

/// Handle to the single background result poller.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A finalized result was fetched and cached this cycle.
    Captured,
    /// The cache already holds the finalized result.
    AlreadyCaptured,
    /// The draw is not finalized yet; poll again later.
    KeepPolling,
}

/// One poll cycle for a game: refresh the draw pointer, then try to capture
/// the previous draw's result.
pub async fn poll_once(state: &SharedState, game: &str) -> Result<PollOutcome, ServiceError> {
    let info = draw_info::refresh(state, game).await?;
    let rule = require_rule(state, game).await?;
    let schedule = Schedule::parse(&rule.schedule)?;

    let Some(previous) = schedule.previous_draw_date(info.draw_date) else {
        return Err(ServiceError::UnusableDrawDate {
            game: game.to_string(),
            draw_date: info.draw_date,
        });
    };

    if let Some(cached) = results::get(state, game, previous).await? {
        if !cached.winning_numbers.is_empty() {
            // A result that was already viewed may belong to an older cycle
            // whose state was never cleared; keep polling so the refreshed
            // draw pointer can roll the previous date forward.
            return Ok(if cached.is_new {
                PollOutcome::AlreadyCaptured
            } else {
                PollOutcome::KeepPolling
            });
        }
    }

    let result = results::cache_remote(state, game, previous).await?;
    if result.winning_numbers.is_empty() {
        debug!(game, draw_date = %previous, "result not finalized yet");
        Ok(PollOutcome::KeepPolling)
    } else {
        info!(game, draw_date = %previous, "captured finalized result");
        Ok(PollOutcome::Captured)
    }
}

async fn run_poll_loop(state: SharedState, game: String, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(state.config().poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(game, "result poller shutting down");
                    return;
                }
            }
            _ = interval.tick() => {
                match poll_once(&state, &game).await {
                    Ok(PollOutcome::Captured) | Ok(PollOutcome::AlreadyCaptured) => {
                        info!(game, "result captured; poller finished");
                        return;
                    }
                    Ok(PollOutcome::KeepPolling) => {}
                    Err(err) if err.is_transient() => {
                        warn!(game, error = %err, "transient poll failure; will retry");
                    }
                    Err(err) => {
                        warn!(game, error = %err, "poll cycle failed; will retry");
                    }
                }
            }
        }
    }
}

/// Start the result poller for a game unless one is already running. The
/// first cycle fires immediately.
pub async fn start_poller(state: &SharedState, game: &str) {
    let mut slot = state.poller().lock().await;
    if let Some(handle) = slot.as_ref() {
        if !handle.is_finished() {
            debug!(game, "result poller already running");
            return;
        }
    }

    let (shutdown, receiver) = watch::channel(false);
    let task = tokio::spawn(run_poll_loop(state.clone(), game.to_string(), receiver));
    *slot = Some(PollerHandle { shutdown, task });
    info!(game, "result poller started");
}

/// Stop the running poller, if any, and wait for it to exit.
pub async fn stop_poller(state: &SharedState) {
    let handle = state.poller().lock().await.take();
    if let Some(handle) = handle {
        let _ = handle.shutdown.send(true);
        if let Err(err) = handle.task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "result poller task failed");
            }
        }
        info!("result poller stopped");
    }
}

/// Make sure the result cache has a row for both the previous and the next
/// draw of a game.
///
/// The previous draw is backfilled from the remote when missing or still a
/// placeholder; transient remote failures are deferred to the poller. The
/// next draw always gets a placeholder so its later capture flips `is_new`.
pub async fn ensure_initial_cache(
    state: &SharedState,
    game: &str,
    previous: NaiveDate,
    next: NaiveDate,
) -> Result<(), ServiceError> {
    let cached = results::get(state, game, previous).await?;
    let needs_backfill = match &cached {
        Some(row) => row.winning_numbers.is_empty(),
        None => true,
    };
    if needs_backfill {
        match results::cache_remote(state, game, previous).await {
            Ok(_) => {}
            Err(err) if err.is_transient() => {
                warn!(game, draw_date = %previous, error = %err, "backfill deferred to poller");
            }
            Err(err) => return Err(err),
        }
    }

    if results::get(state, game, next).await?.is_none() {
        results::upsert(state, results::placeholder(game, next)).await?;
    }
    Ok(())
}

/// Per-(user, game) status summary consumed by callers deciding what to
/// surface after a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStatus {
    /// The next draw still needs a submission from the user.
    pub needs_submission: bool,
    /// At least one cached result has not been viewed yet.
    pub has_unseen_results: bool,
}

/// Compute the aggregate status for one (user, game) pair.
pub async fn aggregate_status(
    state: &SharedState,
    user_id: &str,
    game: &str,
) -> Result<AggregateStatus, ServiceError> {
    let info = draw_info::current(state, game, false).await?;
    let scope = DrawScope::new(user_id, game, info.draw_date);
    // A draft counts as started: the signal flags draws the user has not
    // touched at all, not ones they are mid-way through building.
    let needs_submission = state.store().find_crucible(scope).await?.is_none();
    let has_unseen_results = results::any_unseen(state).await?;
    Ok(AggregateStatus {
        needs_submission,
        has_unseen_results,
    })
}

/// Exchange credentials for a session and run the post-sign-in sync.
pub async fn sign_in(
    state: &SharedState,
    username: &str,
    password: &str,
) -> Result<(), ServiceError> {
    let response = state
        .api()
        .login(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

    info!(user_id = %response.user_id, "signed in");
    state
        .install_session(Session {
            user_id: response.user_id,
            auth_token: response.auth_token,
        })
        .await;

    synchronize(state).await
}

/// Refresh draw pointers and result caches for every game the signed-in user
/// follows, starting the poller when a result is due.
pub async fn synchronize(state: &SharedState) -> Result<(), ServiceError> {
    let user_id = state
        .current_user()
        .await
        .ok_or(ServiceError::NotSignedIn)?;

    let mut games = state.store().followed_games(user_id.clone()).await?;
    if games.is_empty() {
        games = state
            .config()
            .games()
            .iter()
            .map(|rule| rule.game.clone())
            .collect();
    }

    for game in games {
        let info = draw_info::current(state, &game, true).await?;
        let rule = require_rule(state, &game).await?;
        let schedule = Schedule::parse(&rule.schedule)?;

        let Some(previous) = schedule.previous_draw_date(info.draw_date) else {
            warn!(game, draw_date = %info.draw_date, "draw date does not match the schedule");
            continue;
        };
        ensure_initial_cache(state, &game, previous, info.draw_date).await?;

        let Some(previous_instant) = schedule.draw_instant_utc(previous) else {
            continue;
        };
        let previous_captured = results::get(state, &game, previous)
            .await?
            .map(|row| !row.winning_numbers.is_empty())
            .unwrap_or(false);
        if !previous_captured && results_expected(previous_instant, Utc::now(), &chrono::Local) {
            start_poller(state, &game).await;
        }
    }

    Ok(())
}

/// Stop background work and drop the session.
pub async fn sign_out(state: &SharedState) {
    stop_poller(state).await;
    state.clear_session().await;
    info!("signed out");
}
