//! Simple Moving Average.
//!
//! MA(n)[i] = mean(P[i-n+1..=i]), O(n) with a running window sum.
//! Warmup: first (n-1) values are missing.

use crate::domain::indicator::IndicatorOutput;

pub fn calculate_ma(values: &[f64], period: usize) -> IndicatorOutput {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;

    for (i, &v) in values.iter().enumerate() {
        window_sum += v;
        if i >= period {
            window_sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| window_sum / period as f64));
    }

    out
}
