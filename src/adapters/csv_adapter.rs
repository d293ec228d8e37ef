//! CSV file market data adapter.
//!
//! One file per ticker and timeframe, `<TICKER>_<timeframe>.csv`, with a header
//! row `timestamp,open,high,low,close,volume[,amount]`. Rows may be in any order;
//! they are returned ascending by timestamp. A missing `amount` column is
//! filled with `close * volume`.

use crate::domain::bar::Bar;
use crate::domain::error::SamscanError;
use crate::domain::strategy::Timeframe;
use crate::ports::data_port::MarketDataPort;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Deserialize)]
struct CsvBarRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    amount: Option<f64>,
}

pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", ticker, timeframe))
    }

    fn parse_bars(ticker: &str, content: &str) -> Result<Vec<Bar>, SamscanError> {
        let fail = |reason: String| SamscanError::DataSource {
            ticker: ticker.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.deserialize::<CsvBarRecord>() {
            let record = result.map_err(|e| fail(format!("CSV parse error: {}", e)))?;
            let timestamp = parse_timestamp(&record.timestamp)
                .ok_or_else(|| fail(format!("invalid timestamp: {}", record.timestamp)))?;
            bars.push(Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
                amount: record.amount.unwrap_or(record.close * record.volume),
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[async_trait]
impl MarketDataPort for CsvMarketData {
    async fn list_tickers(&self, timeframe: Timeframe) -> Result<Vec<String>, SamscanError> {
        let mut entries =
            tokio::fs::read_dir(&self.base_path)
                .await
                .map_err(|e| SamscanError::DataSource {
                    ticker: "*".to_string(),
                    reason: format!(
                        "failed to read directory {}: {}",
                        self.base_path.display(),
                        e
                    ),
                })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut tickers = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(&suffix) {
                if !ticker.is_empty() {
                    tickers.push(ticker.to_string());
                }
            }
        }

        tickers.sort();
        Ok(tickers)
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, SamscanError> {
        let path = self.csv_path(ticker, timeframe);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(ticker, path = %path.display(), "no history file");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SamscanError::DataSource {
                    ticker: ticker.to_string(),
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut bars = Self::parse_bars(ticker, &content)?;
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        Ok(bars)
    }
}
