//! Ticker universe for the first scan.
//!
//! The universe is either listed explicitly in configuration or, when the list
//! is absent, taken from the data source's ticker listing.

use crate::domain::error::SamscanError;
use crate::domain::strategy::Timeframe;
use crate::ports::data_port::MarketDataPort;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Use `configured` when given, otherwise ask the data source.
pub async fn resolve_universe(
    data: &dyn MarketDataPort,
    configured: Option<Vec<String>>,
    timeframe: Timeframe,
) -> Result<Vec<String>, SamscanError> {
    let tickers = match configured {
        Some(list) => list,
        None => data.list_tickers(timeframe).await?,
    };
    if tickers.is_empty() {
        return Err(SamscanError::EmptyUniverse);
    }
    tracing::debug!(count = tickers.len(), "resolved ticker universe");
    Ok(tickers)
}
