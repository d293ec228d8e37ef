//! Weighted Moving Average.
//!
//! O(n) sliding window implementation using Diophantine technique.
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2)
//! Warmup: first (n-1) values are missing.

use crate::domain::indicator::IndicatorOutput;

pub fn calculate_wma(closes: &[f64], period: usize) -> IndicatorOutput {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    let divisor = period as f64 * (period as f64 + 1.0) / 2.0;
    let mut weighted_sum: f64 = 0.0;
    let mut window_sum: f64 = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        if i < period {
            let weight = (i + 1) as f64;
            weighted_sum += weight * close;
            window_sum += close;
        } else {
            weighted_sum += period as f64 * close - window_sum;
            window_sum += close - closes[i - period];
        }

        values.push((i >= period - 1).then(|| weighted_sum / divisor));
    }

    values
}
