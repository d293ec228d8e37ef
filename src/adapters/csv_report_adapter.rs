//! CSV scan report adapter.

use crate::domain::error::SamscanError;
use crate::domain::scan::SecondScanReport;
use crate::domain::watchlist::Watchlist;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    ticker: &'a str,
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    amount: f64,
}

#[derive(Debug, Serialize)]
struct WatchlistRecord<'a> {
    strategy_id: i64,
    version: u64,
    position: usize,
    ticker: &'a str,
}

/// Writes one CSV row per qualifying ticker (or per watchlist entry).
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    fn writer(output_path: &str) -> Result<csv::Writer<std::fs::File>, SamscanError> {
        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        csv::Writer::from_path(output_path).map_err(|e| SamscanError::Storage {
            reason: format!("failed to open {}: {}", output_path, e),
        })
    }

    fn write_err(output_path: &str, e: impl std::fmt::Display) -> SamscanError {
        SamscanError::Storage {
            reason: format!("failed to write {}: {}", output_path, e),
        }
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_watchlist(&self, watchlist: &Watchlist, output_path: &str) -> Result<(), SamscanError> {
        let mut wtr = Self::writer(output_path)?;
        for (position, ticker) in watchlist.tickers.iter().enumerate() {
            wtr.serialize(WatchlistRecord {
                strategy_id: watchlist.strategy_id,
                version: watchlist.version,
                position,
                ticker,
            })
            .map_err(|e| Self::write_err(output_path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_results(&self, report: &SecondScanReport, output_path: &str) -> Result<(), SamscanError> {
        let mut wtr = Self::writer(output_path)?;
        for row in &report.results {
            wtr.serialize(ResultRecord {
                ticker: &row.ticker,
                timestamp: row.bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                open: row.bar.open,
                high: row.bar.high,
                low: row.bar.low,
                close: row.bar.close,
                volume: row.bar.volume,
                amount: row.bar.amount,
            })
            .map_err(|e| Self::write_err(output_path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use crate::domain::scan::ScanResultRow;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn bar(close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 2.0,
            amount: close * 2.0,
        }
    }

    #[test]
    fn results_written_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/results.csv");
        let report = SecondScanReport {
            results: vec![
                ScanResultRow {
                    ticker: "KRW-BTC".into(),
                    bar: bar(100.0),
                },
                ScanResultRow {
                    ticker: "KRW-ETH".into(),
                    bar: bar(5.5),
                },
            ],
            ..Default::default()
        };

        CsvReportAdapter
            .write_results(&report, path.to_str().unwrap())
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "ticker,timestamp,open,high,low,close,volume,amount"
        );
        assert!(lines[1].starts_with("KRW-BTC,2024-05-02 09:00:00,100.0"));
        assert!(lines[2].starts_with("KRW-ETH,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn watchlist_written_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watchlist.csv");
        let watchlist = Watchlist {
            strategy_id: 4,
            tickers: vec!["B".into(), "A".into()],
            version: 2,
            updated_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };

        CsvReportAdapter
            .write_watchlist(&watchlist, path.to_str().unwrap())
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "strategy_id,version,position,ticker\n4,2,0,B\n4,2,1,A\n"
        );
    }
}
