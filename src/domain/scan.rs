//! Two-phase scan pipeline.
//!
//! Phase 1 screens the whole universe against one snapshot row per ticker with
//! no indicators available. Phase 2 loads a bounded history for each watchlist
//! ticker and qualifies it when the condition holds on the most recent bar.
//! Tickers in phase 2 are independent: one failing never aborts the others.

use crate::domain::bar::Bar;
use crate::domain::error::SamscanError;
use crate::domain::expr_eval::Evaluator;
use crate::domain::frame::Frame;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::strategy::{ScanLogic, SecondScan, StrategyDefinition, Timeframe};
use crate::domain::watchlist::Watchlist;
use crate::ports::data_port::MarketDataPort;
use crate::ports::watchlist_port::WatchlistPort;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 200;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    /// Bars requested per ticker in phase 2.
    pub history_limit: usize,
    /// Phase 2 tickers in flight at once.
    pub max_concurrency: usize,
    pub snapshot_timeframe: Timeframe,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            snapshot_timeframe: Timeframe::Day,
        }
    }
}

/// A qualifying ticker and the latest bar of its history.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResultRow {
    pub ticker: String,
    pub bar: Bar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerFailure {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecondScanReport {
    /// In watchlist order.
    pub results: Vec<ScanResultRow>,
    /// Tickers with no history at the requested timeframe.
    pub skipped: Vec<String>,
    pub failures: Vec<TickerFailure>,
    /// Version of the stored watchlist this run consumed, when it came from a store.
    pub watchlist_version: Option<u64>,
}

impl SecondScanReport {
    pub fn qualified_tickers(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.ticker.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullScanOutcome {
    pub watchlist: Watchlist,
    pub report: SecondScanReport,
}

enum TickerOutcome {
    Qualified(Bar),
    Rejected,
    Skipped,
    Failed(String),
}

/// Evaluate a first scan condition against a snapshot table.
///
/// Returns the tickers whose row is true, in row order. A 0-row snapshot gives an
/// empty list; a condition that fails to compile or evaluate is an error.
pub fn screen_snapshot(snapshot: &Frame, condition: &str) -> Result<Vec<String>, SamscanError> {
    let registry = IndicatorRegistry::empty();
    let evaluator = Evaluator::new(snapshot, &registry);
    let mask = evaluator
        .evaluate_condition(condition)
        .map_err(|e| SamscanError::expression("1st_scan.condition", e))?;

    let tickers = snapshot.tickers().unwrap_or(&[]);
    Ok(tickers
        .iter()
        .enumerate()
        .filter(|(row, _)| mask.is_true_at(*row))
        .map(|(_, ticker)| ticker.clone())
        .collect())
}

/// Bind declared variables in order, then test the condition on the last row.
pub fn matches_latest_bar(
    frame: &Frame,
    indicators: &IndicatorRegistry,
    second: &SecondScan,
) -> Result<bool, SamscanError> {
    let mut evaluator = Evaluator::new(frame, indicators);
    for var in &second.variables {
        evaluator
            .define_variable(&var.name, &var.expression)
            .map_err(|e| SamscanError::expression(format!("variable {}", var.name), e))?;
    }
    let mask = evaluator
        .evaluate_condition(&second.condition)
        .map_err(|e| SamscanError::expression("2nd_scan.condition", e))?;
    Ok(mask.last_is_true())
}

pub struct ScanEngine {
    data: Arc<dyn MarketDataPort>,
    indicators: Arc<IndicatorRegistry>,
    settings: ScanSettings,
}

impl ScanEngine {
    pub fn new(
        data: Arc<dyn MarketDataPort>,
        indicators: Arc<IndicatorRegistry>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            data,
            indicators,
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn data(&self) -> &dyn MarketDataPort {
        self.data.as_ref()
    }

    /// Phase 1. Without a first scan condition the universe passes unchanged
    /// and nothing is fetched.
    pub async fn run_first_scan(
        &self,
        logic: &ScanLogic,
        universe: &[String],
    ) -> Result<Vec<String>, SamscanError> {
        let Some(first) = &logic.first_scan else {
            info!(tickers = universe.len(), "no 1st_scan condition, universe passes");
            return Ok(universe.to_vec());
        };

        let snapshot = self
            .data
            .fetch_snapshot(universe, self.settings.snapshot_timeframe)
            .await;
        if snapshot.len() < universe.len() {
            warn!(
                requested = universe.len(),
                fetched = snapshot.len(),
                "snapshot incomplete"
            );
        }

        let passed = screen_snapshot(&snapshot, &first.condition)?;
        info!(
            universe = universe.len(),
            passed = passed.len(),
            "1st scan complete"
        );
        Ok(passed)
    }

    /// Phase 2 over `watchlist`, preserving its order in the report.
    pub async fn run_second_scan(&self, logic: &ScanLogic, watchlist: &[String]) -> SecondScanReport {
        let Some(second) = &logic.second_scan else {
            warn!("no 2nd_scan section, nothing to evaluate");
            return SecondScanReport::default();
        };

        let second = Arc::new(second.clone());
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let limit = self.settings.history_limit;

        let handles: Vec<(String, JoinHandle<TickerOutcome>)> = watchlist
            .iter()
            .map(|ticker| {
                let data = Arc::clone(&self.data);
                let indicators = Arc::clone(&self.indicators);
                let second = Arc::clone(&second);
                let sem = Arc::clone(&semaphore);
                let owned = ticker.clone();

                let handle = tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return TickerOutcome::Failed("scan cancelled".to_string());
                    };
                    scan_ticker(data.as_ref(), &indicators, &second, &owned, limit).await
                });
                (ticker.clone(), handle)
            })
            .collect();

        let mut report = SecondScanReport::default();
        for (ticker, handle) in handles {
            match handle.await {
                Ok(TickerOutcome::Qualified(bar)) => {
                    debug!(ticker = %ticker, "qualified");
                    report.results.push(ScanResultRow { ticker, bar });
                }
                Ok(TickerOutcome::Rejected) => {}
                Ok(TickerOutcome::Skipped) => {
                    debug!(ticker = %ticker, "no history, skipped");
                    report.skipped.push(ticker);
                }
                Ok(TickerOutcome::Failed(reason)) => {
                    warn!(ticker = %ticker, reason = %reason, "ticker failed");
                    report.failures.push(TickerFailure { ticker, reason });
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "ticker task aborted");
                    report.failures.push(TickerFailure {
                        ticker,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            watchlist = watchlist.len(),
            qualified = report.results.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "2nd scan complete"
        );
        report
    }
}

async fn scan_ticker(
    data: &dyn MarketDataPort,
    indicators: &IndicatorRegistry,
    second: &SecondScan,
    ticker: &str,
    limit: usize,
) -> TickerOutcome {
    let bars = match data.fetch_history(ticker, second.timeframe, limit).await {
        Ok(bars) => bars,
        Err(e) => return TickerOutcome::Failed(e.to_string()),
    };
    if bars.is_empty() {
        return TickerOutcome::Skipped;
    }

    let frame = Frame::new(bars);
    match matches_latest_bar(&frame, indicators, second) {
        Ok(true) => match frame.last_bar() {
            Some(bar) => TickerOutcome::Qualified(bar.clone()),
            None => TickerOutcome::Skipped,
        },
        Ok(false) => TickerOutcome::Rejected,
        Err(e) => TickerOutcome::Failed(e.to_string()),
    }
}

/// Scan engine coupled with the watchlist handoff store.
#[derive(Clone)]
pub struct ScanService {
    engine: Arc<ScanEngine>,
    watchlists: Arc<dyn WatchlistPort>,
}

/// Store calls may block on disk, so they run off the async workers.
async fn blocking_store<T, F>(call: F) -> Result<T, SamscanError>
where
    F: FnOnce() -> Result<T, SamscanError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| SamscanError::Storage {
            reason: format!("watchlist store task failed: {}", e),
        })?
}

impl ScanService {
    pub fn new(engine: ScanEngine, watchlists: Arc<dyn WatchlistPort>) -> Self {
        Self {
            engine: Arc::new(engine),
            watchlists,
        }
    }

    pub fn engine(&self) -> &ScanEngine {
        &self.engine
    }

    /// Run phase 1 and store its output. On error the stored watchlist is untouched.
    #[instrument(skip_all, fields(strategy_id = strategy.id))]
    pub async fn run_first_phase(
        &self,
        strategy: &StrategyDefinition,
        universe: &[String],
    ) -> Result<Watchlist, SamscanError> {
        let passed = self.engine.run_first_scan(&strategy.logic, universe).await?;
        let store = Arc::clone(&self.watchlists);
        let strategy_id = strategy.id;
        let watchlist = blocking_store(move || store.save(strategy_id, &passed)).await?;
        info!(
            tickers = watchlist.len(),
            version = watchlist.version,
            "watchlist stored"
        );
        Ok(watchlist)
    }

    /// Load the stored watchlist and run phase 2 over it.
    #[instrument(skip_all, fields(strategy_id = strategy.id))]
    pub async fn run_second_phase(
        &self,
        strategy: &StrategyDefinition,
    ) -> Result<SecondScanReport, SamscanError> {
        let store = Arc::clone(&self.watchlists);
        let strategy_id = strategy.id;
        let watchlist = blocking_store(move || store.load(strategy_id))
            .await?
            .ok_or(SamscanError::WatchlistMissing { strategy_id })?;
        debug!(version = watchlist.version, tickers = watchlist.len(), "watchlist loaded");

        let mut report = self
            .engine
            .run_second_scan(&strategy.logic, &watchlist.tickers)
            .await;
        report.watchlist_version = Some(watchlist.version);
        Ok(report)
    }

    pub async fn run_full(
        &self,
        strategy: &StrategyDefinition,
        universe: &[String],
    ) -> Result<FullScanOutcome, SamscanError> {
        let watchlist = self.run_first_phase(strategy, universe).await?;
        let report = self.run_second_phase(strategy).await?;
        Ok(FullScanOutcome { watchlist, report })
    }

    /// Run phase 1 on the runtime without blocking the caller.
    pub fn spawn_first_phase(
        &self,
        strategy: StrategyDefinition,
        universe: Vec<String>,
    ) -> JoinHandle<Result<Watchlist, SamscanError>> {
        let service = self.clone();
        tokio::spawn(async move { service.run_first_phase(&strategy, &universe).await })
    }

    pub fn spawn_second_phase(
        &self,
        strategy: StrategyDefinition,
    ) -> JoinHandle<Result<SecondScanReport, SamscanError>> {
        let service = self.clone();
        tokio::spawn(async move { service.run_second_phase(&strategy).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::VariableDecl;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64, volume: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
            amount: close * volume,
        }
    }

    fn second(condition: &str, variables: &[(&str, &str)]) -> SecondScan {
        SecondScan {
            timeframe: Timeframe::Day,
            variables: variables
                .iter()
                .map(|(name, expression)| VariableDecl {
                    name: name.to_string(),
                    expression: expression.to_string(),
                })
                .collect(),
            condition: condition.to_string(),
        }
    }

    #[test]
    fn snapshot_screen_keeps_row_order() {
        let snapshot = Frame::snapshot(vec![
            ("C".into(), bar(1, 300.0, 1.0)),
            ("A".into(), bar(1, 50.0, 1.0)),
            ("B".into(), bar(1, 150.0, 1.0)),
        ]);
        assert_eq!(screen_snapshot(&snapshot, "close > 100").unwrap(), vec!["C", "B"]);
    }

    #[test]
    fn snapshot_screen_on_empty_table() {
        let snapshot = Frame::snapshot(Vec::new());
        assert!(screen_snapshot(&snapshot, "close > 100").unwrap().is_empty());
    }

    #[test]
    fn snapshot_screen_forbids_indicators() {
        let snapshot = Frame::snapshot(vec![("A".into(), bar(1, 1.0, 1.0))]);
        let err = screen_snapshot(&snapshot, "close > ma(5)").unwrap_err();
        assert_eq!(err.exit_status(), 4);
    }

    #[test]
    fn latest_bar_decides() {
        let registry = IndicatorRegistry::standard();
        let frame = Frame::new(vec![bar(1, 200.0, 1.0), bar(2, 200.0, 1.0), bar(3, 50.0, 1.0)]);
        assert!(!matches_latest_bar(&frame, &registry, &second("close > 100", &[])).unwrap());

        let frame = Frame::new(vec![bar(1, 50.0, 1.0), bar(2, 150.0, 1.0)]);
        assert!(matches_latest_bar(&frame, &registry, &second("close > 100", &[])).unwrap());
    }

    #[test]
    fn variables_bind_in_declaration_order() {
        let registry = IndicatorRegistry::standard();
        let frame = Frame::new((1..=6).map(|d| bar(d, d as f64, 1.0)).collect());
        let logic = second(
            "close > fast AND fast > slow.shift(1)",
            &[("slow", "ma(3)"), ("fast", "ma(2)")],
        );
        assert!(matches_latest_bar(&frame, &registry, &logic).unwrap());

        let reversed = second("close > fast", &[("fast", "slow * 2"), ("slow", "ma(2)")]);
        assert!(matches_latest_bar(&frame, &registry, &reversed).is_err());
    }

    #[test]
    fn missing_latest_value_does_not_qualify() {
        let registry = IndicatorRegistry::standard();
        let frame = Frame::new(vec![bar(1, 10.0, 1.0), bar(2, 20.0, 1.0)]);
        assert!(!matches_latest_bar(&frame, &registry, &second("close > ma(5)", &[])).unwrap());
    }

    #[test]
    fn report_lists_qualified_tickers() {
        let report = SecondScanReport {
            results: vec![ScanResultRow {
                ticker: "KRW-BTC".into(),
                bar: bar(1, 1.0, 1.0),
            }],
            ..Default::default()
        };
        assert_eq!(report.qualified_tickers(), vec!["KRW-BTC"]);
    }

    #[test]
    fn default_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.history_limit, 200);
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.snapshot_timeframe, Timeframe::Day);
    }
}
