//! Strategy definitions consumed by the scan pipeline.
//!
//! A strategy carries an identity (the watchlist key), descriptive fields, and
//! its scan logic: an optional snapshot condition and an optional historical
//! pass with ordered variable declarations.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    Minute1,
    Minute3,
    Minute5,
    Minute10,
    Minute15,
    Minute30,
    Minute60,
    Minute240,
    #[default]
    Day,
    Week,
    Month,
}

impl Timeframe {
    pub const ALL: [Timeframe; 11] = [
        Timeframe::Minute1,
        Timeframe::Minute3,
        Timeframe::Minute5,
        Timeframe::Minute10,
        Timeframe::Minute15,
        Timeframe::Minute30,
        Timeframe::Minute60,
        Timeframe::Minute240,
        Timeframe::Day,
        Timeframe::Week,
        Timeframe::Month,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "minute1",
            Timeframe::Minute3 => "minute3",
            Timeframe::Minute5 => "minute5",
            Timeframe::Minute10 => "minute10",
            Timeframe::Minute15 => "minute15",
            Timeframe::Minute30 => "minute30",
            Timeframe::Minute60 => "minute60",
            Timeframe::Minute240 => "minute240",
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe: {0}")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "1d" | "days" => return Ok(Timeframe::Day),
            "1w" | "weeks" => return Ok(Timeframe::Week),
            "1M" | "months" => return Ok(Timeframe::Month),
            _ => {}
        }
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTimeframe(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirstScan {
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecondScan {
    pub timeframe: Timeframe,
    /// Evaluated in declaration order; each may reference only earlier names.
    pub variables: Vec<VariableDecl>,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanLogic {
    pub first_scan: Option<FirstScan>,
    pub second_scan: Option<SecondScan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDefinition {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub market: String,
    pub logic: ScanLogic,
}
