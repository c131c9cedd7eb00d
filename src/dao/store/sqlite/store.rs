use chrono::{DateTime, NaiveDate, Utc};
use futures::future::BoxFuture;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use uuid::Uuid;

use crate::dao::models::{
    Crucible, CrucibleStatus, DrawInfo, DrawResult, DrawScope, GameRule, Ingot, UserGameProgress,
};
use crate::dao::storage::StorageResult;
use crate::dao::store::Store;

use super::error::{SqliteDaoError, SqliteResult};

/// Schema creation statements, executed idempotently at open.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS game_rules (
        game TEXT PRIMARY KEY,
        pool_size INTEGER NOT NULL,
        regular_count INTEGER NOT NULL,
        bonus_pool_size INTEGER NOT NULL,
        bonus_count INTEGER NOT NULL,
        schedule TEXT NOT NULL,
        tier_format TEXT NOT NULL,
        odds TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS game_draw_info (
        game TEXT NOT NULL,
        draw_date TEXT NOT NULL,
        total_combinations INTEGER NOT NULL,
        request_limit INTEGER,
        requests_used INTEGER,
        archive_checksum TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (game, draw_date)
    )",
    "CREATE TABLE IF NOT EXISTS game_results_cache (
        game TEXT NOT NULL,
        draw_date TEXT NOT NULL,
        winning_numbers TEXT NOT NULL,
        bonus_number INTEGER,
        odds TEXT NOT NULL,
        is_new INTEGER NOT NULL,
        win_id TEXT,
        archive_password TEXT,
        archive_checksum TEXT,
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (game, draw_date)
    )",
    "CREATE TABLE IF NOT EXISTS ingot_collection (
        id INTEGER PRIMARY KEY,
        user_id TEXT NOT NULL,
        game TEXT NOT NULL,
        draw_date TEXT NOT NULL,
        numbers TEXT NOT NULL,
        collected_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_ingot_collection_scope
        ON ingot_collection (user_id, game, draw_date)",
    "CREATE TABLE IF NOT EXISTS ingot_crucibles (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        game TEXT NOT NULL,
        draw_date TEXT NOT NULL,
        ingots TEXT NOT NULL,
        status TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, game, draw_date)
    )",
    "CREATE TABLE IF NOT EXISTS user_game_progress (
        user_id TEXT NOT NULL,
        game TEXT NOT NULL,
        score INTEGER NOT NULL,
        awards TEXT NOT NULL,
        stats TEXT NOT NULL,
        last_played TEXT,
        PRIMARY KEY (user_id, game)
    )",
];

/// Durable [`Store`] backend over a local SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and ensure the schema.
    pub async fn open(path: &str) -> SqliteResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        // SQLite allows a single writer; one pooled connection keeps writes
        // serialized and makes the in-memory variant usable in tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| SqliteDaoError::Open {
                path: path.to_string(),
                source,
            })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> SqliteResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|source| SqliteDaoError::Schema { source })?;
        }
        Ok(())
    }

    fn encode_json<T: serde::Serialize>(
        value: &T,
        operation: &'static str,
    ) -> SqliteResult<String> {
        serde_json::to_string(value).map_err(|source| SqliteDaoError::DecodeRow {
            operation,
            source: Box::new(source),
        })
    }

    fn decode_json<T: serde::de::DeserializeOwned>(
        raw: &str,
        operation: &'static str,
    ) -> SqliteResult<T> {
        serde_json::from_str(raw).map_err(|source| SqliteDaoError::DecodeRow {
            operation,
            source: Box::new(source),
        })
    }
}

fn status_to_str(status: CrucibleStatus) -> &'static str {
    match status {
        CrucibleStatus::Draft => "draft",
        CrucibleStatus::Submitted => "submitted",
        CrucibleStatus::Locked => "locked",
    }
}

fn status_from_str(raw: &str, operation: &'static str) -> SqliteResult<CrucibleStatus> {
    match raw {
        "draft" => Ok(CrucibleStatus::Draft),
        "submitted" => Ok(CrucibleStatus::Submitted),
        "locked" => Ok(CrucibleStatus::Locked),
        other => Err(SqliteDaoError::DecodeRow {
            operation,
            source: format!("unknown crucible status `{other}`").into(),
        }),
    }
}

fn decode_draw_info(row: &SqliteRow, operation: &'static str) -> SqliteResult<DrawInfo> {
    let total: i64 = row
        .try_get("total_combinations")
        .map_err(|source| SqliteDaoError::Query { operation, source })?;
    Ok(DrawInfo {
        game: get(row, "game", operation)?,
        draw_date: get(row, "draw_date", operation)?,
        total_combinations: total as u64,
        request_limit: get(row, "request_limit", operation)?,
        requests_used: get(row, "requests_used", operation)?,
        archive_checksum: get(row, "archive_checksum", operation)?,
        updated_at: get(row, "updated_at", operation)?,
    })
}

fn decode_result(row: &SqliteRow, operation: &'static str) -> SqliteResult<DrawResult> {
    let numbers: String = get(row, "winning_numbers", operation)?;
    let odds: String = get(row, "odds", operation)?;
    Ok(DrawResult {
        game: get(row, "game", operation)?,
        draw_date: get(row, "draw_date", operation)?,
        winning_numbers: SqliteStore::decode_json(&numbers, operation)?,
        bonus_number: get(row, "bonus_number", operation)?,
        odds: SqliteStore::decode_json(&odds, operation)?,
        is_new: get(row, "is_new", operation)?,
        win_id: get(row, "win_id", operation)?,
        archive_password: get(row, "archive_password", operation)?,
        archive_checksum: get(row, "archive_checksum", operation)?,
        fetched_at: get(row, "fetched_at", operation)?,
    })
}

fn decode_ingot(row: &SqliteRow, operation: &'static str) -> SqliteResult<Ingot> {
    let numbers: String = get(row, "numbers", operation)?;
    Ok(Ingot {
        id: get(row, "id", operation)?,
        user_id: get(row, "user_id", operation)?,
        game: get(row, "game", operation)?,
        draw_date: get(row, "draw_date", operation)?,
        numbers: SqliteStore::decode_json(&numbers, operation)?,
        collected_at: get(row, "collected_at", operation)?,
    })
}

fn decode_crucible(row: &SqliteRow, operation: &'static str) -> SqliteResult<Crucible> {
    let id: String = get(row, "id", operation)?;
    let id = Uuid::parse_str(&id).map_err(|source| SqliteDaoError::DecodeRow {
        operation,
        source: Box::new(source),
    })?;
    let ingots: String = get(row, "ingots", operation)?;
    let status: String = get(row, "status", operation)?;
    Ok(Crucible {
        id: Some(id),
        user_id: get(row, "user_id", operation)?,
        game: get(row, "game", operation)?,
        draw_date: get(row, "draw_date", operation)?,
        ingots: SqliteStore::decode_json(&ingots, operation)?,
        status: status_from_str(&status, operation)?,
        updated_at: get(row, "updated_at", operation)?,
    })
}

fn get<'r, T>(row: &'r SqliteRow, column: &'static str, operation: &'static str) -> SqliteResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|source| SqliteDaoError::Query { operation, source })
}

impl Store for SqliteStore {
    fn seed_game_rules(&self, rules: Vec<GameRule>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            for rule in rules {
                let odds = Self::encode_json(&rule.odds, "seed_game_rules")?;
                sqlx::query(
                    "INSERT INTO game_rules
                        (game, pool_size, regular_count, bonus_pool_size, bonus_count,
                         schedule, tier_format, odds)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(game) DO UPDATE SET
                        pool_size = excluded.pool_size,
                        regular_count = excluded.regular_count,
                        bonus_pool_size = excluded.bonus_pool_size,
                        bonus_count = excluded.bonus_count,
                        schedule = excluded.schedule,
                        tier_format = excluded.tier_format,
                        odds = excluded.odds",
                )
                .bind(&rule.game)
                .bind(rule.pool_size)
                .bind(rule.regular_count)
                .bind(rule.bonus_pool_size)
                .bind(rule.bonus_count)
                .bind(&rule.schedule)
                .bind(&rule.tier_format)
                .bind(odds)
                .execute(&store.pool)
                .await
                .map_err(|source| SqliteDaoError::Query {
                    operation: "seed_game_rules",
                    source,
                })?;
            }
            Ok(())
        })
    }

    fn game_rule(&self, game: String) -> BoxFuture<'static, StorageResult<Option<GameRule>>> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM game_rules WHERE game = ?")
                .bind(&game)
                .fetch_optional(&store.pool)
                .await
                .map_err(|source| SqliteDaoError::Query {
                    operation: "game_rule",
                    source,
                })?;

            let Some(row) = row else { return Ok(None) };
            let odds: String = get(&row, "odds", "game_rule")?;
            Ok(Some(GameRule {
                game: get(&row, "game", "game_rule")?,
                pool_size: get(&row, "pool_size", "game_rule")?,
                regular_count: get(&row, "regular_count", "game_rule")?,
                bonus_pool_size: get(&row, "bonus_pool_size", "game_rule")?,
                bonus_count: get(&row, "bonus_count", "game_rule")?,
                schedule: get(&row, "schedule", "game_rule")?,
                tier_format: get(&row, "tier_format", "game_rule")?,
                odds: Self::decode_json(&odds, "game_rule")?,
            }))
        })
    }

    fn upsert_draw_info(&self, info: DrawInfo) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO game_draw_info
                    (game, draw_date, total_combinations, request_limit, requests_used,
                     archive_checksum, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(game, draw_date) DO UPDATE SET
                    total_combinations = excluded.total_combinations,
                    request_limit = excluded.request_limit,
                    requests_used = excluded.requests_used,
                    archive_checksum = excluded.archive_checksum,
                    updated_at = excluded.updated_at",
            )
            .bind(&info.game)
            .bind(info.draw_date)
            .bind(info.total_combinations as i64)
            .bind(info.request_limit)
            .bind(info.requests_used)
            .bind(&info.archive_checksum)
            .bind(info.updated_at)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "upsert_draw_info",
                source,
            })?;
            Ok(())
        })
    }

    fn draw_info(
        &self,
        game: String,
        draw_date: Option<NaiveDate>,
    ) -> BoxFuture<'static, StorageResult<Option<DrawInfo>>> {
        let store = self.clone();
        Box::pin(async move {
            let row = match draw_date {
                Some(date) => {
                    sqlx::query("SELECT * FROM game_draw_info WHERE game = ? AND draw_date = ?")
                        .bind(&game)
                        .bind(date)
                        .fetch_optional(&store.pool)
                        .await
                }
                None => {
                    sqlx::query(
                        "SELECT * FROM game_draw_info WHERE game = ?
                         ORDER BY draw_date DESC LIMIT 1",
                    )
                    .bind(&game)
                    .fetch_optional(&store.pool)
                    .await
                }
            }
            .map_err(|source| SqliteDaoError::Query {
                operation: "draw_info",
                source,
            })?;

            match row {
                Some(row) => Ok(Some(decode_draw_info(&row, "draw_info")?)),
                None => Ok(None),
            }
        })
    }

    fn put_ingot(&self, ingot: Ingot) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let numbers = Self::encode_json(&ingot.numbers, "put_ingot")?;
            sqlx::query(
                "INSERT INTO ingot_collection
                    (id, user_id, game, draw_date, numbers, collected_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    game = excluded.game,
                    draw_date = excluded.draw_date,
                    numbers = excluded.numbers,
                    collected_at = excluded.collected_at",
            )
            .bind(ingot.id)
            .bind(&ingot.user_id)
            .bind(&ingot.game)
            .bind(ingot.draw_date)
            .bind(numbers)
            .bind(ingot.collected_at)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "put_ingot",
                source,
            })?;
            Ok(())
        })
    }

    fn list_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<Vec<Ingot>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT * FROM ingot_collection
                 WHERE user_id = ? AND game = ? AND draw_date = ?
                 ORDER BY collected_at DESC, id DESC",
            )
            .bind(&scope.user_id)
            .bind(&scope.game)
            .bind(scope.draw_date)
            .fetch_all(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "list_ingots",
                source,
            })?;

            let mut ingots = Vec::with_capacity(rows.len());
            for row in &rows {
                ingots.push(decode_ingot(row, "list_ingots")?);
            }
            Ok(ingots)
        })
    }

    fn remove_ingot(&self, scope: DrawScope, id: i64) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let done = sqlx::query(
                "DELETE FROM ingot_collection
                 WHERE id = ? AND user_id = ? AND game = ? AND draw_date = ?",
            )
            .bind(id)
            .bind(&scope.user_id)
            .bind(&scope.game)
            .bind(scope.draw_date)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "remove_ingot",
                source,
            })?;
            Ok(done.rows_affected())
        })
    }

    fn clear_ingots(&self, scope: DrawScope) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let done = sqlx::query(
                "DELETE FROM ingot_collection
                 WHERE user_id = ? AND game = ? AND draw_date = ?",
            )
            .bind(&scope.user_id)
            .bind(&scope.game)
            .bind(scope.draw_date)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "clear_ingots",
                source,
            })?;
            Ok(done.rows_affected())
        })
    }

    fn upsert_crucible(&self, crucible: Crucible) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            // Callers assign an id before the first save; keep it stable on
            // conflict so the remote lock call stays idempotent per crucible.
            let id = crucible.id.unwrap_or_else(Uuid::new_v4);
            let ingots = Self::encode_json(&crucible.ingots, "upsert_crucible")?;
            sqlx::query(
                "INSERT INTO ingot_crucibles
                    (id, user_id, game, draw_date, ingots, status, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(user_id, game, draw_date) DO UPDATE SET
                    ingots = excluded.ingots,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
            )
            .bind(id.to_string())
            .bind(&crucible.user_id)
            .bind(&crucible.game)
            .bind(crucible.draw_date)
            .bind(ingots)
            .bind(status_to_str(crucible.status))
            .bind(crucible.updated_at)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "upsert_crucible",
                source,
            })?;
            Ok(())
        })
    }

    fn find_crucible(
        &self,
        scope: DrawScope,
    ) -> BoxFuture<'static, StorageResult<Option<Crucible>>> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT * FROM ingot_crucibles
                 WHERE user_id = ? AND game = ? AND draw_date = ?",
            )
            .bind(&scope.user_id)
            .bind(&scope.game)
            .bind(scope.draw_date)
            .fetch_optional(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "find_crucible",
                source,
            })?;

            match row {
                Some(row) => Ok(Some(decode_crucible(&row, "find_crucible")?)),
                None => Ok(None),
            }
        })
    }

    fn upsert_result(&self, result: DrawResult) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let numbers = Self::encode_json(&result.winning_numbers, "upsert_result")?;
            let odds = Self::encode_json(&result.odds, "upsert_result")?;
            sqlx::query(
                "INSERT INTO game_results_cache
                    (game, draw_date, winning_numbers, bonus_number, odds, is_new,
                     win_id, archive_password, archive_checksum, fetched_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(game, draw_date) DO UPDATE SET
                    winning_numbers = excluded.winning_numbers,
                    bonus_number = excluded.bonus_number,
                    odds = excluded.odds,
                    is_new = excluded.is_new,
                    win_id = excluded.win_id,
                    archive_password = excluded.archive_password,
                    archive_checksum = excluded.archive_checksum,
                    fetched_at = excluded.fetched_at",
            )
            .bind(&result.game)
            .bind(result.draw_date)
            .bind(numbers)
            .bind(result.bonus_number)
            .bind(odds)
            .bind(result.is_new)
            .bind(&result.win_id)
            .bind(&result.archive_password)
            .bind(&result.archive_checksum)
            .bind(result.fetched_at)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "upsert_result",
                source,
            })?;
            Ok(())
        })
    }

    fn find_result(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<Option<DrawResult>>> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM game_results_cache WHERE game = ? AND draw_date = ?")
                .bind(&game)
                .bind(draw_date)
                .fetch_optional(&store.pool)
                .await
                .map_err(|source| SqliteDaoError::Query {
                    operation: "find_result",
                    source,
                })?;

            match row {
                Some(row) => Ok(Some(decode_result(&row, "find_result")?)),
                None => Ok(None),
            }
        })
    }

    fn mark_result_seen(
        &self,
        game: String,
        draw_date: NaiveDate,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let done = sqlx::query(
                "UPDATE game_results_cache SET is_new = 0
                 WHERE game = ? AND draw_date = ? AND is_new = 1",
            )
            .bind(&game)
            .bind(draw_date)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "mark_result_seen",
                source,
            })?;
            Ok(done.rows_affected())
        })
    }

    fn any_unseen_results(&self) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let unseen: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM game_results_cache WHERE is_new = 1)",
            )
            .fetch_one(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "any_unseen_results",
                source,
            })?;
            Ok(unseen != 0)
        })
    }

    fn upsert_progress(&self, progress: UserGameProgress) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let awards = Self::encode_json(&progress.awards, "upsert_progress")?;
            let stats = Self::encode_json(&progress.stats, "upsert_progress")?;
            sqlx::query(
                "INSERT INTO user_game_progress
                    (user_id, game, score, awards, stats, last_played)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(user_id, game) DO UPDATE SET
                    score = excluded.score,
                    awards = excluded.awards,
                    stats = excluded.stats,
                    last_played = excluded.last_played",
            )
            .bind(&progress.user_id)
            .bind(&progress.game)
            .bind(progress.score)
            .bind(awards)
            .bind(stats)
            .bind(progress.last_played)
            .execute(&store.pool)
            .await
            .map_err(|source| SqliteDaoError::Query {
                operation: "upsert_progress",
                source,
            })?;
            Ok(())
        })
    }

    fn find_progress(
        &self,
        user_id: String,
        game: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserGameProgress>>> {
        let store = self.clone();
        Box::pin(async move {
            let row = sqlx::query("SELECT * FROM user_game_progress WHERE user_id = ? AND game = ?")
                .bind(&user_id)
                .bind(&game)
                .fetch_optional(&store.pool)
                .await
                .map_err(|source| SqliteDaoError::Query {
                    operation: "find_progress",
                    source,
                })?;

            let Some(row) = row else { return Ok(None) };
            let awards: String = get(&row, "awards", "find_progress")?;
            let stats: String = get(&row, "stats", "find_progress")?;
            Ok(Some(UserGameProgress {
                user_id: get(&row, "user_id", "find_progress")?,
                game: get(&row, "game", "find_progress")?,
                score: get(&row, "score", "find_progress")?,
                awards: Self::decode_json(&awards, "find_progress")?,
                stats: Self::decode_json(&stats, "find_progress")?,
                last_played: get(&row, "last_played", "find_progress")?,
            }))
        })
    }

    fn followed_games(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows =
                sqlx::query("SELECT game FROM user_game_progress WHERE user_id = ? ORDER BY game")
                    .bind(&user_id)
                    .fetch_all(&store.pool)
                    .await
                    .map_err(|source| SqliteDaoError::Query {
                        operation: "followed_games",
                        source,
                    })?;

            let mut games = Vec::with_capacity(rows.len());
            for row in &rows {
                games.push(get(row, "game", "followed_games")?);
            }
            Ok(games)
        })
    }

    fn close(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.pool.close().await;
            Ok(())
        })
    }
}
