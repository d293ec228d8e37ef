//! Configuration and strategy validation.
//!
//! Checks run before any data is fetched: config values are range-checked and
//! every strategy expression is compiled and evaluated against a 0-row frame so
//! syntax, arity and type errors surface up front.

use crate::domain::error::SamscanError;
use crate::domain::frame::Frame;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::scan::{matches_latest_bar, screen_snapshot};
use crate::domain::strategy::{StrategyDefinition, Timeframe};
use crate::ports::config_port::ConfigPort;

pub const WATCHLIST_STORES: [&str; 2] = ["memory", "sqlite"];

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), SamscanError> {
    validate_data_path(config)?;
    validate_positive(config, "scan", "history_limit")?;
    validate_positive(config, "scan", "max_concurrency")?;
    validate_timeframe(config, "scan", "snapshot_timeframe")?;
    validate_watchlist_store(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SamscanError> {
    validate_strategy_id(config)?;
    if !config.has_section("1st_scan") && !config.has_section("2nd_scan") {
        return Err(SamscanError::ConfigMissing {
            section: "2nd_scan".to_string(),
            key: "condition".to_string(),
        });
    }
    if config.has_section("1st_scan") {
        require(config, "1st_scan", "condition")?;
    }
    if config.has_section("2nd_scan") {
        require(config, "2nd_scan", "condition")?;
        validate_timeframe(config, "2nd_scan", "timeframe")?;
        validate_variables(config)?;
    }
    Ok(())
}

/// Compile and dry-run every expression of `strategy` on an empty frame.
pub fn validate_expressions(
    strategy: &StrategyDefinition,
    indicators: &IndicatorRegistry,
) -> Result<(), SamscanError> {
    if let Some(first) = &strategy.logic.first_scan {
        screen_snapshot(&Frame::snapshot(Vec::new()), &first.condition)?;
    }
    if let Some(second) = &strategy.logic.second_scan {
        matches_latest_bar(&Frame::empty(), indicators, second)?;
    }
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SamscanError> {
    config
        .get_string(section, key)
        .ok_or_else(|| SamscanError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn validate_data_path(config: &dyn ConfigPort) -> Result<(), SamscanError> {
    require(config, "data", "path").map(|_| ())
}

fn validate_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SamscanError> {
    if config.get_string(section, key).is_none() {
        return Ok(());
    }
    let value = config.get_int(section, key, 0);
    if value < 1 {
        return Err(SamscanError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{} must be a positive integer", key),
        });
    }
    Ok(())
}

fn validate_timeframe(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SamscanError> {
    match config.get_string(section, key) {
        None => Ok(()),
        Some(raw) => raw
            .parse::<Timeframe>()
            .map(|_| ())
            .map_err(|e| SamscanError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn validate_watchlist_store(config: &dyn ConfigPort) -> Result<(), SamscanError> {
    match config.get_string("watchlist", "store") {
        Some(store) if !WATCHLIST_STORES.contains(&store.trim()) => {
            Err(SamscanError::ConfigInvalid {
                section: "watchlist".to_string(),
                key: "store".to_string(),
                reason: format!("store must be one of {}", WATCHLIST_STORES.join(", ")),
            })
        }
        _ => Ok(()),
    }
}

fn validate_strategy_id(config: &dyn ConfigPort) -> Result<(), SamscanError> {
    let raw = require(config, "strategy", "id")?;
    raw.trim()
        .parse::<i64>()
        .map(|_| ())
        .map_err(|_| SamscanError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "id".to_string(),
            reason: format!("id must be an integer, got {}", raw),
        })
}

fn validate_variables(config: &dyn ConfigPort) -> Result<(), SamscanError> {
    for name in config.get_list("2nd_scan", "variables").unwrap_or_default() {
        require(config, "variables", &name)?;
    }
    Ok(())
}
