//! Tabular evaluation context: an ordered run of bars with a fixed column schema.
//!
//! Historical frames hold one ticker's bars in ascending time order. Snapshot
//! frames hold one latest bar per ticker and carry the ticker label of each row.

use crate::domain::bar::Bar;

/// Numeric columns addressable from expressions.
pub const COLUMNS: [&str; 7] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "timestamp",
];

#[derive(Debug, Clone, Default)]
pub struct Frame {
    bars: Vec<Bar>,
    tickers: Option<Vec<String>>,
}

impl Frame {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            tickers: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot table from `(ticker, latest bar)` rows, keeping row order.
    pub fn snapshot(rows: Vec<(String, Bar)>) -> Self {
        let (tickers, bars): (Vec<String>, Vec<Bar>) = rows.into_iter().unzip();
        Self {
            bars,
            tickers: Some(tickers),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Ticker label per row, present on snapshot tables only.
    pub fn tickers(&self) -> Option<&[String]> {
        self.tickers.as_deref()
    }

    pub fn has_column(&self, name: &str) -> bool {
        COLUMNS.contains(&name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let pick: fn(&Bar) -> f64 = match name {
            "open" => |b: &Bar| b.open,
            "high" => |b: &Bar| b.high,
            "low" => |b: &Bar| b.low,
            "close" => |b: &Bar| b.close,
            "volume" => |b: &Bar| b.volume,
            "amount" => |b: &Bar| b.amount,
            "timestamp" => Bar::epoch_seconds,
            _ => return None,
        };
        Some(self.bars.iter().map(pick).collect())
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
