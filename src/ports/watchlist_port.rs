//! Watchlist handoff store between the two scan phases.

use crate::domain::error::SamscanError;
use crate::domain::watchlist::Watchlist;

/// Keyed by strategy identity. `save` replaces the stored list wholesale
/// (last writer wins) and bumps the per-strategy version; `load` returns one
/// consistent snapshot.
///
/// Calls are synchronous and may block on disk; async callers run them on the
/// blocking pool.
pub trait WatchlistPort: Send + Sync {
    fn save(&self, strategy_id: i64, tickers: &[String]) -> Result<Watchlist, SamscanError>;

    fn load(&self, strategy_id: i64) -> Result<Option<Watchlist>, SamscanError>;
}
