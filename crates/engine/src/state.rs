//! Per-script state cells.
//!
//! A cell is created on first access for a (scope, script path) pair and handed out by
//! reference afterwards: every handle for the same pair reads and writes one value. Cells
//! live in memory for as long as their scope does.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde_json::Value;

/// A shared, mutable state value.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<RwLock<Value>>);

impl StateCell {
    fn new(initial: Value) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    /// Current value.
    pub fn get(&self) -> Value {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replaces the value.
    pub fn set(&self, value: Value) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// Returns true if both handles point at the same cell.
    pub fn same_cell(&self, other: &StateCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A namespace of state cells, keyed by script path.
///
/// Clones share the same cells.
#[derive(Debug, Clone, Default)]
pub struct StateScope {
    cells: Arc<DashMap<String, StateCell>>,
}

impl StateScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell for `script_path`, creating it with `initial` if missing.
    ///
    /// `initial` is ignored when the cell already exists.
    pub fn get_or_create(&self, script_path: &str, initial: Value) -> StateCell {
        self.cells
            .entry(script_path.to_string())
            .or_insert_with(|| StateCell::new(initial))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// State store with one process-wide default scope.
#[derive(Debug, Default)]
pub struct ScopedStateStore {
    default_scope: StateScope,
}

impl ScopedStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_scope(&self) -> &StateScope {
        &self.default_scope
    }

    /// Returns the cell for `script_path` in `scope`, or in the default scope when `scope` is
    /// `None`. New cells start as `initial`, or an empty object.
    pub fn get_or_create(
        &self,
        script_path: &str,
        scope: Option<&StateScope>,
        initial: Option<Value>,
    ) -> StateCell {
        let scope = scope.unwrap_or(&self.default_scope);
        scope.get_or_create(script_path, initial.unwrap_or_else(empty_state))
    }
}

/// The value a cell starts with when no initial value is given.
pub fn empty_state() -> Value {
    Value::Object(serde_json::Map::new())
}
