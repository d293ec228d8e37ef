//! Indicator registry: name → pure transform over the bound frame.
//!
//! The registry is handed to an evaluator at construction and never mutated by
//! it. Transforms take positional numeric parameters and return one value per
//! frame row, `None` during warm-up.
//!
//! `IndicatorRegistry::standard()` carries the built-in set below;
//! `IndicatorRegistry::empty()` is what snapshot screening uses.

pub mod bollinger;
pub mod ema;
pub mod ma;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod stddev;
pub mod wma;

use crate::domain::frame::Frame;
use crate::domain::indicator_helpers::{calc_atr, expect_arity, multiplier_param, period_param};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type IndicatorOutput = Vec<Option<f64>>;
pub type IndicatorResult = Result<IndicatorOutput, IndicatorError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("expected {expected} parameters, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("parameter {index} must be a positive integer, got {value}")]
    InvalidPeriod { index: usize, value: f64 },

    #[error("parameter {index} must be a finite number, got {value}")]
    NotFinite { index: usize, value: f64 },
}

pub trait Indicator: Send + Sync {
    fn compute(&self, frame: &Frame, params: &[f64]) -> IndicatorResult;
}

impl<F> Indicator for F
where
    F: Fn(&Frame, &[f64]) -> IndicatorResult + Send + Sync,
{
    fn compute(&self, frame: &Frame, params: &[f64]) -> IndicatorResult {
        self(frame, params)
    }
}

#[derive(Clone, Default)]
pub struct IndicatorRegistry {
    functions: HashMap<String, Arc<dyn Indicator>>,
}

impl IndicatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        Self::empty()
            .with("ma", close_period(ma::calculate_ma))
            .with("ema", close_period(ema::calculate_ema))
            .with("wma", close_period(wma::calculate_wma))
            .with("rsi", close_period(rsi::calculate_rsi))
            .with("roc", close_period(roc::calculate_roc))
            .with("stddev", close_period(stddev::calculate_stddev))
            .with("atr", |frame: &Frame, params: &[f64]| -> IndicatorResult {
                expect_arity(params, 1)?;
                Ok(calc_atr(frame.bars(), period_param(params, 0)?))
            })
            .with("obv", |frame: &Frame, params: &[f64]| -> IndicatorResult {
                expect_arity(params, 0)?;
                Ok(obv::calculate_obv(frame.bars()))
            })
            .with("vol_ma", |frame: &Frame, params: &[f64]| -> IndicatorResult {
                expect_arity(params, 1)?;
                let volumes: Vec<f64> = frame.bars().iter().map(|b| b.volume).collect();
                Ok(ma::calculate_ma(&volumes, period_param(params, 0)?))
            })
            .with("bb_upper", bollinger_band(bollinger::Band::Upper))
            .with("bb_lower", bollinger_band(bollinger::Band::Lower))
    }

    pub fn with(mut self, name: &str, indicator: impl Indicator + 'static) -> Self {
        self.register(name, indicator);
        self
    }

    pub fn register(&mut self, name: &str, indicator: impl Indicator + 'static) {
        self.functions.insert(name.to_string(), Arc::new(indicator));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Indicator> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for IndicatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Adapt a `(closes, period)` calculation into a registry transform.
fn close_period(calc: fn(&[f64], usize) -> IndicatorOutput) -> impl Indicator {
    move |frame: &Frame, params: &[f64]| -> IndicatorResult {
        expect_arity(params, 1)?;
        Ok(calc(&frame.closes(), period_param(params, 0)?))
    }
}

fn bollinger_band(band: bollinger::Band) -> impl Indicator {
    move |frame: &Frame, params: &[f64]| -> IndicatorResult {
        expect_arity(params, 2)?;
        let period = period_param(params, 0)?;
        let mult = multiplier_param(params, 1)?;
        Ok(bollinger::calculate_bollinger(&frame.closes(), period, mult, band))
    }
}
