//! Shared helper functions for indicator calculations.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorError, IndicatorOutput};

pub fn expect_arity(params: &[f64], expected: usize) -> Result<(), IndicatorError> {
    if params.len() != expected {
        return Err(IndicatorError::Arity {
            expected,
            actual: params.len(),
        });
    }
    Ok(())
}

/// Read parameter `index` as a window length: a finite, positive whole number.
pub fn period_param(params: &[f64], index: usize) -> Result<usize, IndicatorError> {
    let value = params[index];
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(IndicatorError::InvalidPeriod { index, value });
    }
    Ok(value as usize)
}

pub fn multiplier_param(params: &[f64], index: usize) -> Result<f64, IndicatorError> {
    let value = params[index];
    if !value.is_finite() {
        return Err(IndicatorError::NotFinite { index, value });
    }
    Ok(value)
}

/// Wilder-smoothed average true range. Warmup: first (period-1) bars are missing.
pub fn calc_atr(bars: &[Bar], period: usize) -> IndicatorOutput {
    if bars.len() < period || period == 0 {
        return vec![None; bars.len()];
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut results: IndicatorOutput = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for i in 0..bars.len() {
        if i < period - 1 {
            results.push(None);
        } else if i == period - 1 {
            atr = tr_values[0..=i].iter().sum::<f64>() / period as f64;
            results.push(Some(atr));
        } else {
            atr = (atr * (period - 1) as f64 + tr_values[i]) / period as f64;
            results.push(Some(atr));
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
            amount: close * 1000.0,
        }
    }

    #[test]
    fn atr_basic() {
        let bars: Vec<Bar> = (0..5).map(|i| make_bar(i + 1, 110.0, 90.0, 100.0)).collect();

        let series = calc_atr(&bars, 3);
        assert_eq!(series.len(), 5);

        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!((series[2].unwrap() - 20.0).abs() < 1e-9);
        assert!((series[4].unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn atr_short_input_is_all_missing() {
        let bars = vec![make_bar(1, 110.0, 90.0, 100.0)];
        assert_eq!(calc_atr(&bars, 3), vec![None]);
    }

    #[test]
    fn period_param_accepts_whole_numbers() {
        assert_eq!(period_param(&[5.0], 0), Ok(5));
        assert_eq!(
            period_param(&[0.0], 0),
            Err(IndicatorError::InvalidPeriod { index: 0, value: 0.0 })
        );
        assert!(period_param(&[f64::INFINITY], 0).is_err());
        assert!(period_param(&[-3.0], 0).is_err());
    }

    #[test]
    fn arity_mismatch() {
        assert!(expect_arity(&[1.0, 2.0], 2).is_ok());
        assert_eq!(
            expect_arity(&[1.0], 2),
            Err(IndicatorError::Arity { expected: 2, actual: 1 })
        );
    }
}
