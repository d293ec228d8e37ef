//! Market data port: the exchange-facing collaborator of the scan pipeline.

use crate::domain::bar::Bar;
use crate::domain::error::SamscanError;
use crate::domain::frame::Frame;
use crate::domain::strategy::Timeframe;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use std::panic::AssertUnwindSafe;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Every ticker the source can serve at `timeframe`.
    async fn list_tickers(&self, timeframe: Timeframe) -> Result<Vec<String>, SamscanError>;

    /// Up to `limit` most recent bars in ascending time order, most recent last.
    ///
    /// An unknown ticker or a gap in coverage is an empty vector, not an error.
    async fn fetch_history(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, SamscanError>;

    /// One latest bar per ticker, in `tickers` order, best effort.
    ///
    /// Tickers that fail, panic or return nothing are omitted from the table.
    async fn fetch_snapshot(&self, tickers: &[String], timeframe: Timeframe) -> Frame {
        let fetches = tickers.iter().map(|ticker| async move {
            let fetch = AssertUnwindSafe(self.fetch_history(ticker, timeframe, 2));
            match fetch.catch_unwind().await {
                Ok(Ok(bars)) => bars.last().cloned().map(|bar| (ticker.clone(), bar)),
                Ok(Err(e)) => {
                    tracing::warn!(ticker = %ticker, error = %e, "snapshot fetch failed");
                    None
                }
                Err(_) => {
                    tracing::warn!(ticker = %ticker, "snapshot fetch panicked");
                    None
                }
            }
        });

        let rows: Vec<(String, Bar)> = join_all(fetches).await.into_iter().flatten().collect();
        tracing::debug!(requested = tickers.len(), fetched = rows.len(), "snapshot built");
        Frame::snapshot(rows)
    }
}
