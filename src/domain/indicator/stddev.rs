//! Standard Deviation.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / n)
//! Warmup: first (n-1) values are missing.

use crate::domain::indicator::IndicatorOutput;

pub fn calculate_stddev(closes: &[f64], period: usize) -> IndicatorOutput {
    (0..closes.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            Some(window_stddev(&closes[i + 1 - period..=i]))
        })
        .collect()
}

pub(crate) fn window_stddev(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}
