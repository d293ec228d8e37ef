//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::{ExprError, SamscanError};
use crate::domain::expr_eval::Evaluator;
use crate::domain::frame::Frame;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::scan::{
    ScanEngine, ScanService, ScanSettings, SecondScanReport, DEFAULT_HISTORY_LIMIT,
    DEFAULT_MAX_CONCURRENCY,
};
use crate::domain::strategy::{
    FirstScan, ScanLogic, SecondScan, StrategyDefinition, Timeframe, UnknownTimeframe, VariableDecl,
};
use crate::domain::strategy_validation::{
    validate_expressions, validate_scan_config, validate_strategy_config,
};
use crate::domain::universe::{parse_tickers, resolve_universe};
use crate::domain::watchlist::{InMemoryWatchlistStore, Watchlist};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::watchlist_port::WatchlistPort;

#[derive(Parser, Debug)]
#[command(name = "samscan", version, about = "Two-phase strategy screener")]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen the ticker universe against the snapshot condition and store the watchlist
    FirstScan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        /// Comma-separated tickers, overriding [scan] tickers
        #[arg(long)]
        tickers: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the historical condition over the stored watchlist
    SecondScan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run both phases back to back
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy file and print its compiled expressions
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
        /// Also validate a scan configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List tickers available from the data directory
    ListTickers {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        timeframe: Option<String>,
    },
}

/// Install the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "samscan=info",
        1 => "samscan=debug",
        _ => "samscan=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub async fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::FirstScan {
            config,
            strategy,
            tickers,
            output,
        } => run_first_scan(&config, &strategy, tickers.as_deref(), output.as_deref()).await,
        Command::SecondScan {
            config,
            strategy,
            output,
        } => run_second_scan(&config, &strategy, output.as_deref()).await,
        Command::Scan {
            config,
            strategy,
            tickers,
            output,
        } => run_full_scan(&config, &strategy, tickers.as_deref(), output.as_deref()).await,
        Command::Validate { strategy, config } => run_validate(&strategy, config.as_deref()),
        Command::ListTickers { config, timeframe } => {
            run_list_tickers(&config, timeframe.as_deref()).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SamscanError> {
    tracing::debug!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

fn parse_timeframe(raw: &str, section: &str, key: &str) -> Result<Timeframe, SamscanError> {
    raw.parse().map_err(|e: UnknownTimeframe| {
        SamscanError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: e.to_string(),
        }
    })
}

pub fn build_scan_settings(config: &dyn ConfigPort) -> Result<ScanSettings, SamscanError> {
    let snapshot_timeframe = match config.get_string("scan", "snapshot_timeframe") {
        Some(raw) => parse_timeframe(&raw, "scan", "snapshot_timeframe")?,
        None => Timeframe::Day,
    };
    Ok(ScanSettings {
        history_limit: config
            .get_int("scan", "history_limit", DEFAULT_HISTORY_LIMIT as i64)
            .max(1) as usize,
        max_concurrency: config
            .get_int("scan", "max_concurrency", DEFAULT_MAX_CONCURRENCY as i64)
            .max(1) as usize,
        snapshot_timeframe,
    })
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<StrategyDefinition, SamscanError> {
    let id_raw = config
        .get_string("strategy", "id")
        .ok_or_else(|| SamscanError::ConfigMissing {
            section: "strategy".into(),
            key: "id".into(),
        })?;
    let id = id_raw
        .trim()
        .parse::<i64>()
        .map_err(|_| SamscanError::ConfigInvalid {
            section: "strategy".into(),
            key: "id".into(),
            reason: format!("id must be an integer, got {}", id_raw),
        })?;

    let first_scan = config
        .get_string("1st_scan", "condition")
        .map(|condition| FirstScan { condition });

    let second_scan = match config.get_string("2nd_scan", "condition") {
        None => None,
        Some(condition) => {
            let timeframe = match config.get_string("2nd_scan", "timeframe") {
                Some(raw) => parse_timeframe(&raw, "2nd_scan", "timeframe")?,
                None => Timeframe::Day,
            };
            let variables = config
                .get_list("2nd_scan", "variables")
                .unwrap_or_default()
                .into_iter()
                .map(|name| {
                    let expression = config.get_string("variables", &name).ok_or_else(|| {
                        SamscanError::ConfigMissing {
                            section: "variables".into(),
                            key: name.clone(),
                        }
                    })?;
                    Ok(VariableDecl { name, expression })
                })
                .collect::<Result<Vec<_>, SamscanError>>()?;
            Some(SecondScan {
                timeframe,
                variables,
                condition,
            })
        }
    };

    Ok(StrategyDefinition {
        id,
        name: config
            .get_string("strategy", "name")
            .unwrap_or_else(|| format!("strategy-{}", id)),
        description: config
            .get_string("strategy", "description")
            .unwrap_or_default(),
        market: config.get_string("strategy", "market").unwrap_or_default(),
        logic: ScanLogic {
            first_scan,
            second_scan,
        },
    })
}

/// Ticker list from `--tickers`, else `[scan] tickers`, else `None` (ask the data source).
pub fn resolve_tickers(
    override_list: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Option<Vec<String>>, SamscanError> {
    let (raw, source) = match (override_list, config.get_string("scan", "tickers")) {
        (Some(list), _) => (list.to_string(), "--tickers"),
        (None, Some(list)) => (list, "tickers"),
        (None, None) => return Ok(None),
    };
    parse_tickers(&raw)
        .map(Some)
        .map_err(|e| SamscanError::ConfigInvalid {
            section: "scan".into(),
            key: source.into(),
            reason: e.to_string(),
        })
}

pub fn build_watchlist_store(
    config: &dyn ConfigPort,
) -> Result<Arc<dyn WatchlistPort>, SamscanError> {
    let store = config
        .get_string("watchlist", "store")
        .unwrap_or_else(|| "memory".to_string());
    match store.trim() {
        "memory" => Ok(Arc::new(InMemoryWatchlistStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteWatchlistStore;
            Ok(Arc::new(SqliteWatchlistStore::from_config(config)?))
        }
        other => Err(SamscanError::ConfigInvalid {
            section: "watchlist".into(),
            key: "store".into(),
            reason: format!("unsupported store: {}", other),
        }),
    }
}

fn build_data_port(config: &dyn ConfigPort) -> Result<Arc<dyn MarketDataPort>, SamscanError> {
    let path = config
        .get_string("data", "path")
        .ok_or_else(|| SamscanError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    Ok(Arc::new(CsvMarketData::new(PathBuf::from(path))))
}

pub fn build_service(config: &dyn ConfigPort) -> Result<ScanService, SamscanError> {
    let engine = ScanEngine::new(
        build_data_port(config)?,
        Arc::new(IndicatorRegistry::standard()),
        build_scan_settings(config)?,
    );
    Ok(ScanService::new(engine, build_watchlist_store(config)?))
}

struct ScanContext {
    config: FileConfigAdapter,
    service: ScanService,
    strategy: StrategyDefinition,
}

fn prepare(config_path: &Path, strategy_path: &Path) -> Result<ScanContext, SamscanError> {
    let config = load_config(config_path)?;
    validate_scan_config(&config)?;

    let strategy_config = load_config(strategy_path)?;
    validate_strategy_config(&strategy_config)?;
    let strategy = build_strategy(&strategy_config)?;
    validate_expressions(&strategy, &IndicatorRegistry::standard())?;

    let service = build_service(&config)?;
    tracing::info!(strategy_id = strategy.id, name = %strategy.name, "strategy loaded");
    Ok(ScanContext {
        config,
        service,
        strategy,
    })
}

fn output_path(cli_output: Option<&Path>, config: &dyn ConfigPort) -> Option<String> {
    cli_output
        .map(|p| p.display().to_string())
        .or_else(|| config.get_string("output", "path"))
}

async fn universe(ctx: &ScanContext, tickers: Option<&str>) -> Result<Vec<String>, SamscanError> {
    let configured = resolve_tickers(tickers, &ctx.config)?;
    let settings = ctx.service.engine().settings();
    resolve_universe(ctx.service.engine().data(), configured, settings.snapshot_timeframe).await
}

fn print_watchlist(watchlist: &Watchlist) {
    for ticker in &watchlist.tickers {
        println!("{}", ticker);
    }
    eprintln!(
        "{} tickers on watchlist (strategy {}, version {})",
        watchlist.len(),
        watchlist.strategy_id,
        watchlist.version
    );
}

fn print_report(report: &SecondScanReport) {
    for row in &report.results {
        println!(
            "{}\t{}\t{:.4}\t{:.4}",
            row.ticker,
            row.bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            row.bar.close,
            row.bar.volume
        );
    }
    eprintln!(
        "{} qualified, {} skipped, {} failed",
        report.results.len(),
        report.skipped.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        eprintln!("  {}: {}", failure.ticker, failure.reason);
    }
}

async fn run_first_scan(
    config_path: &Path,
    strategy_path: &Path,
    tickers: Option<&str>,
    output: Option<&Path>,
) -> Result<(), SamscanError> {
    let ctx = prepare(config_path, strategy_path)?;
    let universe = universe(&ctx, tickers).await?;

    let watchlist = ctx
        .service
        .spawn_first_phase(ctx.strategy.clone(), universe)
        .await
        .map_err(|e| SamscanError::Storage {
            reason: format!("first scan task failed: {}", e),
        })??;

    print_watchlist(&watchlist);
    if let Some(path) = output_path(output, &ctx.config) {
        CsvReportAdapter.write_watchlist(&watchlist, &path)?;
        eprintln!("Watchlist written to: {}", path);
    }
    Ok(())
}

async fn run_second_scan(
    config_path: &Path,
    strategy_path: &Path,
    output: Option<&Path>,
) -> Result<(), SamscanError> {
    let ctx = prepare(config_path, strategy_path)?;
    let report = ctx
        .service
        .spawn_second_phase(ctx.strategy.clone())
        .await
        .map_err(|e| SamscanError::Storage {
            reason: format!("second scan task failed: {}", e),
        })??;

    print_report(&report);
    if let Some(path) = output_path(output, &ctx.config) {
        CsvReportAdapter.write_results(&report, &path)?;
        eprintln!("Results written to: {}", path);
    }
    Ok(())
}

async fn run_full_scan(
    config_path: &Path,
    strategy_path: &Path,
    tickers: Option<&str>,
    output: Option<&Path>,
) -> Result<(), SamscanError> {
    let ctx = prepare(config_path, strategy_path)?;
    let universe = universe(&ctx, tickers).await?;

    let outcome = ctx.service.run_full(&ctx.strategy, &universe).await?;
    eprintln!(
        "1st scan: {} of {} tickers passed",
        outcome.watchlist.len(),
        universe.len()
    );
    print_report(&outcome.report);
    if let Some(path) = output_path(output, &ctx.config) {
        CsvReportAdapter.write_results(&outcome.report, &path)?;
        eprintln!("Results written to: {}", path);
    }
    Ok(())
}

fn print_compiled(
    label: &str,
    source: &str,
    compiled: Result<String, ExprError>,
) -> Result<(), SamscanError> {
    eprintln!("\n{}:", label);
    match compiled {
        Ok(rpn) => {
            eprintln!("  Raw: {}", source);
            eprintln!("  RPN: {}", rpn);
            Ok(())
        }
        Err(e) => {
            for line in e.display_with_context(source).lines() {
                eprintln!("  {}", line);
            }
            Err(SamscanError::expression(label, e))
        }
    }
}

pub fn run_validate(strategy_path: &Path, config_path: Option<&Path>) -> Result<(), SamscanError> {
    if let Some(path) = config_path {
        eprintln!("Validating config: {}", path.display());
        validate_scan_config(&load_config(path)?)?;
    }

    eprintln!("Validating strategy: {}", strategy_path.display());
    let adapter = load_config(strategy_path)?;
    validate_strategy_config(&adapter)?;
    let strategy = build_strategy(&adapter)?;

    let frame = Frame::empty();
    if let Some(first) = &strategy.logic.first_scan {
        let registry = IndicatorRegistry::empty();
        let eval = Evaluator::new(&frame, &registry);
        let compiled = eval.compile(&first.condition).map(|c| c.to_string());
        print_compiled("1st_scan.condition", &first.condition, compiled)?;
    }

    if let Some(second) = &strategy.logic.second_scan {
        let registry = IndicatorRegistry::standard();
        let mut eval = Evaluator::new(&frame, &registry);
        for var in &second.variables {
            let compiled = eval.compile(&var.expression).map(|c| c.to_string());
            print_compiled(&format!("variable {}", var.name), &var.expression, compiled)?;
            eval.define_variable(&var.name, &var.expression)
                .map_err(|e| SamscanError::expression(format!("variable {}", var.name), e))?;
        }
        let compiled = eval.compile(&second.condition).map(|c| c.to_string());
        print_compiled("2nd_scan.condition", &second.condition, compiled)?;
        eprintln!("  Timeframe: {}", second.timeframe);
    }

    validate_expressions(&strategy, &IndicatorRegistry::standard())?;
    eprintln!("\nStrategy configuration is valid.");
    Ok(())
}

async fn run_list_tickers(config_path: &Path, timeframe: Option<&str>) -> Result<(), SamscanError> {
    let config = load_config(config_path)?;
    let timeframe = match timeframe {
        Some(raw) => parse_timeframe(raw, "cli", "timeframe")?,
        None => build_scan_settings(&config)?.snapshot_timeframe,
    };
    let data = build_data_port(&config)?;
    let tickers = data.list_tickers(timeframe).await?;

    if tickers.is_empty() {
        eprintln!("No tickers found for timeframe {}", timeframe);
    } else {
        for ticker in &tickers {
            println!("{}", ticker);
        }
        eprintln!("{} tickers found", tickers.len());
    }
    Ok(())
}
