//! SQLite watchlist store.
//!
//! Tables:
//! - `watchlists(strategy_id PRIMARY KEY, version, updated_at)`
//! - `watchlist_tickers(strategy_id, position, ticker)`
//!
//! A save rewrites both tables for one strategy inside an immediate transaction,
//! so concurrent writers serialize and readers never see a half-written list.

use crate::domain::error::SamscanError;
use crate::domain::watchlist::Watchlist;
use crate::ports::config_port::ConfigPort;
use crate::ports::watchlist_port::WatchlistPort;
use chrono::{NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub struct SqliteWatchlistStore {
    pool: Pool<SqliteConnectionManager>,
}

fn storage_error(e: impl std::fmt::Display) -> SamscanError {
    SamscanError::Storage {
        reason: e.to_string(),
    }
}

impl SqliteWatchlistStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SamscanError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SamscanError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(storage_error)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, SamscanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage_error)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SamscanError> {
        self.pool.get().map_err(storage_error)
    }

    pub fn initialize_schema(&self) -> Result<(), SamscanError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS watchlists (
                    strategy_id INTEGER PRIMARY KEY,
                    version INTEGER NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS watchlist_tickers (
                    strategy_id INTEGER NOT NULL,
                    position INTEGER NOT NULL,
                    ticker TEXT NOT NULL,
                    PRIMARY KEY (strategy_id, position)
                );",
            )
            .map_err(storage_error)
    }
}

impl WatchlistPort for SqliteWatchlistStore {
    fn save(&self, strategy_id: i64, tickers: &[String]) -> Result<Watchlist, SamscanError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_error)?;

        let previous: Option<i64> = tx
            .query_row(
                "SELECT version FROM watchlists WHERE strategy_id = ?1",
                params![strategy_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;
        let version = previous.map_or(1, |v| v + 1);
        let updated_at = Utc::now().naive_utc();

        tx.execute(
            "INSERT OR REPLACE INTO watchlists (strategy_id, version, updated_at)
             VALUES (?1, ?2, ?3)",
            params![
                strategy_id,
                version,
                updated_at.format(TIMESTAMP_FORMAT).to_string()
            ],
        )
        .map_err(storage_error)?;
        tx.execute(
            "DELETE FROM watchlist_tickers WHERE strategy_id = ?1",
            params![strategy_id],
        )
        .map_err(storage_error)?;

        for (position, ticker) in tickers.iter().enumerate() {
            tx.execute(
                "INSERT INTO watchlist_tickers (strategy_id, position, ticker)
                 VALUES (?1, ?2, ?3)",
                params![strategy_id, position as i64, ticker],
            )
            .map_err(storage_error)?;
        }

        tx.commit().map_err(storage_error)?;

        Ok(Watchlist {
            strategy_id,
            tickers: tickers.to_vec(),
            version: version as u64,
            updated_at,
        })
    }

    fn load(&self, strategy_id: i64) -> Result<Option<Watchlist>, SamscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_error)?;

        let header: Option<(i64, String)> = tx
            .query_row(
                "SELECT version, updated_at FROM watchlists WHERE strategy_id = ?1",
                params![strategy_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(storage_error)?;

        let Some((version, updated_at)) = header else {
            return Ok(None);
        };
        let updated_at =
            NaiveDateTime::parse_from_str(&updated_at, TIMESTAMP_FORMAT).map_err(storage_error)?;

        let tickers = {
            let mut stmt = tx
                .prepare(
                    "SELECT ticker FROM watchlist_tickers
                     WHERE strategy_id = ?1 ORDER BY position",
                )
                .map_err(storage_error)?;
            let rows = stmt
                .query_map(params![strategy_id], |row| row.get::<_, String>(0))
                .map_err(storage_error)?;
            rows.collect::<Result<Vec<String>, _>>()
                .map_err(storage_error)?
        };

        tx.commit().map_err(storage_error)?;

        Ok(Some(Watchlist {
            strategy_id,
            tickers,
            version: version as u64,
            updated_at,
        }))
    }
}
