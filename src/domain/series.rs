//! Column-aligned evaluation results.
//!
//! A `None` entry is a missing value (indicator warm-up, rows shifted in by a
//! lag). Missing values propagate through arithmetic and comparisons; AND/OR
//! follow three-valued logic. Consumers of a boolean mask treat missing as false.

#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Number(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
}

impl Series {
    pub fn numbers(values: Vec<f64>) -> Self {
        Series::Number(values.into_iter().map(Some).collect())
    }

    pub fn broadcast(value: f64, len: usize) -> Self {
        Series::Number(vec![Some(value); len])
    }

    pub fn len(&self) -> usize {
        match self {
            Series::Number(v) => v.len(),
            Series::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Series::Number(_) => "number",
            Series::Bool(_) => "boolean",
        }
    }

    pub fn as_bools(&self) -> Option<&[Option<bool>]> {
        match self {
            Series::Bool(v) => Some(v),
            Series::Number(_) => None,
        }
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match self {
            Series::Number(v) => Some(v),
            Series::Bool(_) => None,
        }
    }

    /// True only when row `index` holds a present `true`.
    pub fn is_true_at(&self, index: usize) -> bool {
        matches!(self, Series::Bool(v) if v.get(index) == Some(&Some(true)))
    }

    /// True only when the final row holds a present `true`.
    pub fn last_is_true(&self) -> bool {
        match self.len() {
            0 => false,
            n => self.is_true_at(n - 1),
        }
    }

    /// Offset rows by `periods`: positive looks into the past, negative into the future.
    /// Rows without a source row become missing.
    pub fn shift(&self, periods: i64) -> Series {
        match self {
            Series::Number(v) => Series::Number(shift_values(v, periods)),
            Series::Bool(v) => Series::Bool(shift_values(v, periods)),
        }
    }
}

fn shift_values<T: Copy>(values: &[Option<T>], periods: i64) -> Vec<Option<T>> {
    let len = values.len();
    let offset = periods.unsigned_abs() as usize;
    (0..len)
        .map(|i| {
            let source = if periods >= 0 {
                i.checked_sub(offset)
            } else {
                i.checked_add(offset).filter(|&j| j < len)
            };
            source.and_then(|j| values[j])
        })
        .collect()
}
