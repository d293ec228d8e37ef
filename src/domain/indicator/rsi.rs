//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n values are missing (need n price changes).

use crate::domain::indicator::IndicatorOutput;

pub fn calculate_rsi(closes: &[f64], period: usize) -> IndicatorOutput {
    if period == 0 || closes.len() < 2 {
        return vec![None; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(None);

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for gain_idx in 0..gains.len() {
        if gain_idx < period - 1 {
            values.push(None);
            continue;
        }

        if gain_idx == period - 1 {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[gain_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[gain_idx]) / period as f64;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        values.push(Some(rsi));
    }

    values
}
