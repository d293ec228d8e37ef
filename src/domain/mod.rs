//! Core domain types and logic.

pub mod bar;
pub mod error;
pub mod expr;
pub mod expr_compiler;
pub mod expr_eval;
pub mod frame;
pub mod indicator;
pub mod indicator_helpers;
pub mod scan;
pub mod series;
pub mod strategy;
pub mod strategy_validation;
pub mod token;
pub mod universe;
pub mod variables;
pub mod watchlist;
