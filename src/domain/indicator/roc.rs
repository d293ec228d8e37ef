//! ROC (Rate of Change).
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! If C[i-n] == 0: ROC = 0
//! Warmup: first n values are missing.

use crate::domain::indicator::IndicatorOutput;

pub fn calculate_roc(closes: &[f64], period: usize) -> IndicatorOutput {
    (0..closes.len())
        .map(|i| {
            if i < period {
                return None;
            }
            let prev_close = closes[i - period];
            if prev_close == 0.0 {
                Some(0.0)
            } else {
                Some(((closes[i] - prev_close) / prev_close) * 100.0)
            }
        })
        .collect()
}
