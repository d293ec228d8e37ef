//! CLI integration tests for config loading and command orchestration.
//!
//! Tests cover:
//! - Strategy and scan settings parsing (build_strategy, build_scan_settings)
//! - Ticker resolution (resolve_tickers)
//! - Validation of INI files on disk
//! - End-to-end commands over a CSV data directory

use clap::Parser;
use samscan::adapters::file_config_adapter::FileConfigAdapter;
use samscan::cli::{self, Cli, Command};
use samscan::domain::error::SamscanError;
use samscan::domain::strategy::Timeframe;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const STRATEGY_INI: &str = r#"
[strategy]
id = 42
name = Volume breakout
description = Liquid names breaking above their short average
market = KRW

[1st_scan]
condition = close > 100 AND amount >= 1000

[2nd_scan]
timeframe = days
variables = fast, slow
condition = fast > slow AND fast > fast.shift(1)

[variables]
fast = ma(2)
slow = ma(4)
"#;

fn scan_ini(data_dir: &Path, extra: &str) -> String {
    format!(
        "[data]\npath = {}\n\n[scan]\nhistory_limit = 50\nmax_concurrency = 2\n{}",
        data_dir.display(),
        extra
    )
}

fn write_csv(dir: &Path, ticker: &str, closes: &[f64]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for (i, close) in closes.iter().enumerate() {
        content.push_str(&format!(
            "2024-01-{:02},{c},{c},{c},{c},1000\n",
            i + 1,
            c = close
        ));
    }
    std::fs::write(dir.join(format!("{}_day.csv", ticker)), content).unwrap();
}

mod strategy_loading {
    use super::*;

    #[test]
    fn builds_full_strategy() {
        let config = FileConfigAdapter::from_string(STRATEGY_INI).unwrap();
        let strategy = cli::build_strategy(&config).unwrap();

        assert_eq!(strategy.id, 42);
        assert_eq!(strategy.name, "Volume breakout");
        assert_eq!(strategy.market, "KRW");

        let first = strategy.logic.first_scan.unwrap();
        assert_eq!(first.condition, "close > 100 AND amount >= 1000");

        let second = strategy.logic.second_scan.unwrap();
        assert_eq!(second.timeframe, Timeframe::Day);
        let names: Vec<&str> = second.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow"]);
        assert_eq!(second.variables[1].expression, "ma(4)");
        assert_eq!(second.condition, "fast > slow AND fast > fast.shift(1)");
    }

    #[test]
    fn first_scan_only_strategy() {
        let config = FileConfigAdapter::from_string(
            "[strategy]\nid = 1\n\n[1st_scan]\ncondition = close > 1\n",
        )
        .unwrap();
        let strategy = cli::build_strategy(&config).unwrap();

        assert!(strategy.logic.second_scan.is_none());
        assert_eq!(strategy.name, "strategy-1");
    }

    #[test]
    fn non_integer_id_is_invalid() {
        let config = FileConfigAdapter::from_string("[strategy]\nid = abc\n").unwrap();
        let err = cli::build_strategy(&config).unwrap_err();
        assert!(matches!(err, SamscanError::ConfigInvalid { .. }));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn undeclared_variable_body_is_missing() {
        let config = FileConfigAdapter::from_string(
            "[strategy]\nid = 1\n\n[2nd_scan]\nvariables = fast\ncondition = fast > 1\n",
        )
        .unwrap();
        let err = cli::build_strategy(&config).unwrap_err();
        assert!(matches!(
            err,
            SamscanError::ConfigMissing { ref section, ref key } if section == "variables" && key == "fast"
        ));
    }

    #[test]
    fn unknown_timeframe_is_invalid() {
        let config = FileConfigAdapter::from_string(
            "[strategy]\nid = 1\n\n[2nd_scan]\ntimeframe = fortnight\ncondition = close > 1\n",
        )
        .unwrap();
        assert!(matches!(
            cli::build_strategy(&config),
            Err(SamscanError::ConfigInvalid { .. })
        ));
    }
}

mod settings_loading {
    use super::*;

    #[test]
    fn defaults_when_scan_section_absent() {
        let config = FileConfigAdapter::from_string("[data]\npath = /tmp\n").unwrap();
        let settings = cli::build_scan_settings(&config).unwrap();
        assert_eq!(settings.history_limit, 200);
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.snapshot_timeframe, Timeframe::Day);
    }

    #[test]
    fn reads_configured_values() {
        let config = FileConfigAdapter::from_string(
            "[scan]\nhistory_limit = 30\nmax_concurrency = 4\nsnapshot_timeframe = minute60\n",
        )
        .unwrap();
        let settings = cli::build_scan_settings(&config).unwrap();
        assert_eq!(settings.history_limit, 30);
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.snapshot_timeframe, Timeframe::Minute60);
    }

    #[test]
    fn unsupported_store_is_rejected() {
        let config = FileConfigAdapter::from_string("[watchlist]\nstore = redis\n").unwrap();
        assert!(matches!(
            cli::build_watchlist_store(&config),
            Err(SamscanError::ConfigInvalid { .. })
        ));
    }
}

mod ticker_resolution {
    use super::*;

    #[test]
    fn cli_override_wins() {
        let config = FileConfigAdapter::from_string("[scan]\ntickers = KRW-BTC\n").unwrap();
        let tickers = cli::resolve_tickers(Some("krw-eth, krw-xrp"), &config).unwrap();
        assert_eq!(tickers, Some(vec!["KRW-ETH".to_string(), "KRW-XRP".to_string()]));
    }

    #[test]
    fn falls_back_to_config() {
        let config = FileConfigAdapter::from_string("[scan]\ntickers = KRW-BTC,KRW-ETH\n").unwrap();
        let tickers = cli::resolve_tickers(None, &config).unwrap();
        assert_eq!(tickers, Some(vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()]));
    }

    #[test]
    fn none_when_unconfigured() {
        let config = FileConfigAdapter::from_string("[scan]\nhistory_limit = 5\n").unwrap();
        assert_eq!(cli::resolve_tickers(None, &config).unwrap(), None);
    }

    #[test]
    fn duplicate_override_is_invalid() {
        let config = FileConfigAdapter::from_string("[scan]\n").unwrap();
        let err = cli::resolve_tickers(Some("KRW-BTC,krw-btc"), &config).unwrap_err();
        assert!(matches!(err, SamscanError::ConfigInvalid { .. }));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_strategy_file_passes() {
        let file = write_temp_ini(STRATEGY_INI);
        assert!(cli::run_validate(file.path(), None).is_ok());
    }

    #[test]
    fn compile_error_is_expression_error() {
        let file = write_temp_ini(
            "[strategy]\nid = 1\n\n[2nd_scan]\ncondition = close > banana\n",
        );
        let err = cli::run_validate(file.path(), None).unwrap_err();
        assert_eq!(err.exit_status(), 4);
    }

    #[test]
    fn indicator_in_first_scan_is_rejected() {
        let file = write_temp_ini("[strategy]\nid = 1\n\n[1st_scan]\ncondition = ma(5) > 1\n");
        let err = cli::run_validate(file.path(), None).unwrap_err();
        assert!(matches!(err, SamscanError::Expression { .. }));
    }

    #[test]
    fn missing_file_is_parse_error() {
        let err = cli::run_validate(Path::new("/nonexistent/strategy.ini"), None).unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn scan_config_without_data_path_fails() {
        let strategy = write_temp_ini(STRATEGY_INI);
        let config = write_temp_ini("[scan]\nhistory_limit = 10\n");
        let err = cli::run_validate(strategy.path(), Some(config.path())).unwrap_err();
        assert!(matches!(err, SamscanError::ConfigMissing { .. }));
    }
}

mod argument_parsing {
    use super::*;

    #[test]
    fn parses_scan_with_verbosity() {
        let cli = Cli::try_parse_from([
            "samscan", "-vv", "scan", "--config", "c.ini", "--strategy", "s.ini", "--tickers",
            "KRW-BTC",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Scan {
                config,
                strategy,
                tickers,
                output,
            } => {
                assert_eq!(config, PathBuf::from("c.ini"));
                assert_eq!(strategy, PathBuf::from("s.ini"));
                assert_eq!(tickers.as_deref(), Some("KRW-BTC"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn second_scan_requires_strategy() {
        assert!(Cli::try_parse_from(["samscan", "second-scan", "--config", "c.ini"]).is_err());
    }
}

mod end_to_end {
    use super::*;

    fn seed_data(dir: &Path) {
        // BTC: passes both phases; ETH: passes phase 1, falling history; XRP: too cheap
        write_csv(dir, "KRW-BTC", &[110.0, 120.0, 130.0, 140.0, 150.0]);
        write_csv(dir, "KRW-ETH", &[150.0, 140.0, 130.0, 120.0, 110.0]);
        write_csv(dir, "KRW-XRP", &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn full_scan_writes_results() {
        let data_dir = tempfile::tempdir().unwrap();
        seed_data(data_dir.path());
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("results.csv");

        let config = write_temp_ini(&scan_ini(data_dir.path(), ""));
        let strategy = write_temp_ini(STRATEGY_INI);

        cli::run(Cli {
            verbose: 0,
            command: Command::Scan {
                config: config.path().to_path_buf(),
                strategy: strategy.path().to_path_buf(),
                tickers: None,
                output: Some(output.clone()),
            },
        })
        .await;

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ticker"));
        assert!(lines[1].starts_with("KRW-BTC"));
    }

    #[tokio::test]
    async fn first_scan_writes_watchlist() {
        let data_dir = tempfile::tempdir().unwrap();
        seed_data(data_dir.path());
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("watchlist.csv");

        let config = write_temp_ini(&scan_ini(data_dir.path(), ""));
        let strategy = write_temp_ini(STRATEGY_INI);

        cli::run(Cli {
            verbose: 0,
            command: Command::FirstScan {
                config: config.path().to_path_buf(),
                strategy: strategy.path().to_path_buf(),
                tickers: Some("KRW-XRP,KRW-ETH,KRW-BTC".into()),
                output: Some(output.clone()),
            },
        })
        .await;

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(!written.contains("KRW-XRP"));
        let eth = written.find("KRW-ETH").unwrap();
        let btc = written.find("KRW-BTC").unwrap();
        assert!(eth < btc);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn phases_hand_off_through_sqlite_between_runs() {
        let data_dir = tempfile::tempdir().unwrap();
        seed_data(data_dir.path());
        let db_dir = tempfile::tempdir().unwrap();
        let db_path = db_dir.path().join("watchlist.db");
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("results.csv");

        let extra = format!(
            "\n[watchlist]\nstore = sqlite\n\n[sqlite]\npath = {}\n",
            db_path.display()
        );
        let config = write_temp_ini(&scan_ini(data_dir.path(), &extra));
        let strategy = write_temp_ini(STRATEGY_INI);

        cli::run(Cli {
            verbose: 0,
            command: Command::FirstScan {
                config: config.path().to_path_buf(),
                strategy: strategy.path().to_path_buf(),
                tickers: None,
                output: None,
            },
        })
        .await;

        cli::run(Cli {
            verbose: 0,
            command: Command::SecondScan {
                config: config.path().to_path_buf(),
                strategy: strategy.path().to_path_buf(),
                output: Some(output.clone()),
            },
        })
        .await;

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("KRW-BTC"));
        assert!(!written.contains("KRW-ETH"));
    }

    #[test]
    fn service_requires_data_path() {
        let config = FileConfigAdapter::from_string("[scan]\nhistory_limit = 5\n").unwrap();
        assert!(matches!(
            cli::build_service(&config),
            Err(SamscanError::ConfigMissing { .. })
        ));
    }
}
