//! Value cells: named, mutable, typed slots for rule-local variables.
//!
//! SPEC_FULL.md §3 and §9 describe value cells as arena-allocated per rule,
//! with calls holding "stable references/handles into the arena" rather
//! than owning the storage themselves. [`CellArena`] is that arena; a
//! [`CellId`] is the handle. Interior mutability (`RefCell`) lets many
//! `Call`s read and write the same cell during one `NextSolution` pass
//! without fighting the borrow checker over a shared `&mut`.

use crate::value::{DataType, TedValue};
use std::cell::RefCell;

/// Handle into a [`CellArena`]. Stable for the lifetime of the rule that
/// owns the arena.
pub type CellId = usize;

#[derive(Debug)]
struct Slot {
    name: String,
    ty: DataType,
    value: RefCell<Option<TedValue>>,
}

/// Per-rule arena of value cells. One arena is built while compiling a rule
/// and lives as long as the compiled [`crate::rule::Rule`].
#[derive(Debug, Default)]
pub struct CellArena {
    slots: Vec<Slot>,
}

impl CellArena {
    pub fn new() -> Self {
        CellArena { slots: Vec::new() }
    }

    /// Allocate a fresh cell for a named, typed variable.
    pub fn alloc(&mut self, name: impl Into<String>, ty: DataType) -> CellId {
        let id = self.slots.len();
        self.slots.push(Slot {
            name: name.into(),
            ty,
            value: RefCell::new(None),
        });
        id
    }

    pub fn name(&self, id: CellId) -> &str {
        &self.slots[id].name
    }

    pub fn data_type(&self, id: CellId) -> DataType {
        self.slots[id].ty
    }

    /// Current value, if bound.
    pub fn get(&self, id: CellId) -> Option<TedValue> {
        self.slots[id].value.borrow().clone()
    }

    /// `true` if the cell currently holds a value.
    pub fn is_bound(&self, id: CellId) -> bool {
        self.slots[id].value.borrow().is_some()
    }

    /// Bind (or rebind) a cell's value. Used by `Write` match operations.
    pub fn set(&self, id: CellId, value: TedValue) {
        *self.slots[id].value.borrow_mut() = Some(value);
    }

    /// Unbind a cell. Used when a `Call::Reset` needs to undo a previous
    /// solution's writes before searching again.
    pub fn clear(&self, id: CellId) {
        *self.slots[id].value.borrow_mut() = None;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot every cell's current binding, for `RuleExecution` error
    /// diagnostics.
    pub fn snapshot(&self) -> Vec<(String, Option<TedValue>)> {
        self.slots
            .iter()
            .map(|s| (s.name.clone(), s.value.borrow().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cell_is_unbound() {
        let mut arena = CellArena::new();
        let id = arena.alloc("x", DataType::Int);
        assert!(!arena.is_bound(id));
        assert_eq!(arena.get(id), None);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut arena = CellArena::new();
        let id = arena.alloc("x", DataType::Int);
        arena.set(id, TedValue::Int(42));
        assert!(arena.is_bound(id));
        assert_eq!(arena.get(id), Some(TedValue::Int(42)));
    }

    #[test]
    fn clear_unbinds() {
        let mut arena = CellArena::new();
        let id = arena.alloc("x", DataType::Int);
        arena.set(id, TedValue::Int(1));
        arena.clear(id);
        assert!(!arena.is_bound(id));
    }

    #[test]
    fn snapshot_reports_names_and_bindings() {
        let mut arena = CellArena::new();
        let x = arena.alloc("x", DataType::Int);
        let y = arena.alloc("y", DataType::Bool);
        arena.set(x, TedValue::Int(7));
        let snap = arena.snapshot();
        assert_eq!(snap[x], ("x".to_string(), Some(TedValue::Int(7))));
        assert_eq!(snap[y], ("y".to_string(), None));
    }
}
