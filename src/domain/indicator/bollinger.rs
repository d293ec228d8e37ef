//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) values are missing.

use crate::domain::indicator::IndicatorOutput;
use crate::domain::indicator::stddev::window_stddev;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Upper,
    Lower,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, mult: f64, band: Band) -> IndicatorOutput {
    (0..closes.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &closes[i + 1 - period..=i];
            let middle = window.iter().sum::<f64>() / period as f64;
            let offset = mult * window_stddev(window);
            Some(match band {
                Band::Upper => middle + offset,
                Band::Lower => middle - offset,
            })
        })
        .collect()
}
