//! OBV (On-Balance Volume).

use crate::domain::bar::Bar;
use crate::domain::indicator::IndicatorOutput;

/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period; every row is present.
pub fn calculate_obv(bars: &[Bar]) -> IndicatorOutput {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv: f64 = 0.0;
    let mut prev_close: f64 = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            obv = bar.volume;
        } else if bar.close > prev_close {
            obv += bar.volume;
        } else if bar.close < prev_close {
            obv -= bar.volume;
        }
        prev_close = bar.close;
        values.push(Some(obv));
    }

    values
}
