#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use samscan::domain::bar::Bar;
use samscan::domain::error::SamscanError;
use samscan::domain::strategy::{
    FirstScan, ScanLogic, SecondScan, StrategyDefinition, Timeframe, VariableDecl,
};
use samscan::ports::data_port::MarketDataPort;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MockMarketData {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub panics: HashSet<String>,
    pub fetches: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            panics: HashSet::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn with_panic(mut self, ticker: &str) -> Self {
        self.panics.insert(ticker.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn list_tickers(&self, _timeframe: Timeframe) -> Result<Vec<String>, SamscanError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }

    async fn fetch_history(
        &self,
        ticker: &str,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, SamscanError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.panics.contains(ticker) {
            panic!("mock panic for {}", ticker);
        }
        if let Some(reason) = self.errors.get(ticker) {
            return Err(SamscanError::DataSource {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(ticker).cloned().unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        Ok(bars.into_iter().skip(skip).collect())
    }
}

pub fn day(n: i64) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(n)
}

pub fn make_bar(n: i64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: day(n),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume,
        amount: close * volume,
    }
}

/// Bars from a close sequence, one per day.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c, 1000.0))
        .collect()
}

pub fn tickers(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

pub fn make_strategy(
    id: i64,
    first: Option<&str>,
    second: Option<&str>,
    variables: &[(&str, &str)],
) -> StrategyDefinition {
    StrategyDefinition {
        id,
        name: format!("test-{}", id),
        description: String::new(),
        market: "KRW".into(),
        logic: ScanLogic {
            first_scan: first.map(|c| FirstScan {
                condition: c.to_string(),
            }),
            second_scan: second.map(|c| SecondScan {
                timeframe: Timeframe::Day,
                variables: variables
                    .iter()
                    .map(|(name, expression)| VariableDecl {
                        name: name.to_string(),
                        expression: expression.to_string(),
                    })
                    .collect(),
                condition: c.to_string(),
            }),
        },
    }
}
