//! Per-evaluator variable bindings.

use crate::domain::expr::CompiledExpr;
use std::collections::HashMap;
use std::sync::Arc;

/// Name → compiled sub-expression, scoped to one evaluator.
///
/// Bindings are never evaluated on insertion. A later definition under the same
/// name replaces the binding for subsequent references only; expressions that
/// already captured the old binding keep it.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    bindings: HashMap<String, Arc<CompiledExpr>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, expr: CompiledExpr) {
        self.bindings.insert(name.into(), Arc::new(expr));
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledExpr>> {
        self.bindings.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
