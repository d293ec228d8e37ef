//! Watchlist: the tickers that survived the first scan for one strategy.

use crate::domain::error::SamscanError;
use crate::ports::watchlist_port::WatchlistPort;
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watchlist {
    pub strategy_id: i64,
    pub tickers: Vec<String>,
    /// Starts at 1 and increases by one on every save for the same strategy.
    pub version: u64,
    pub updated_at: NaiveDateTime,
}

impl Watchlist {
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// Process-local handoff store. Each save replaces the whole entry under one lock.
#[derive(Debug, Default)]
pub struct InMemoryWatchlistStore {
    entries: Mutex<HashMap<i64, Watchlist>>,
}

impl InMemoryWatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, Watchlist>>, SamscanError> {
        self.entries.lock().map_err(|_| SamscanError::Storage {
            reason: "watchlist store lock poisoned".to_string(),
        })
    }
}

impl WatchlistPort for InMemoryWatchlistStore {
    fn save(&self, strategy_id: i64, tickers: &[String]) -> Result<Watchlist, SamscanError> {
        let mut entries = self.lock()?;
        let version = entries.get(&strategy_id).map_or(1, |w| w.version + 1);
        let watchlist = Watchlist {
            strategy_id,
            tickers: tickers.to_vec(),
            version,
            updated_at: Utc::now().naive_utc(),
        };
        entries.insert(strategy_id, watchlist.clone());
        Ok(watchlist)
    }

    fn load(&self, strategy_id: i64) -> Result<Option<Watchlist>, SamscanError> {
        Ok(self.lock()?.get(&strategy_id).cloned())
    }
}
