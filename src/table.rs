//! Table storage: an append-only row array plus zero or more hash indices.
//!
//! Grounded on SPEC_FULL.md §3 ("Table") and §9's storage design notes:
//! capacity doubles in powers of two as rows are appended, an optional
//! `Unique` row-set dedups whole rows, and at most one key index exists per
//! column (SPEC_FULL.md's invariant I-KEY1). Indices are rebuilt in place
//! whenever the table's capacity changes, since the open-addressing bucket
//! count in `crate::index` is sized off that capacity.

use crate::error::{TedError, TedResult};
use crate::index::{GeneralIndex, Index, KeyIndex};
use crate::value::{DataType, Tuple};
use std::collections::HashSet;
use tracing::trace;

const INITIAL_CAPACITY: usize = 16;

/// A base (extensional) or materialized (intensional) relation.
#[derive(Debug)]
pub struct Table {
    name: String,
    schema: Vec<DataType>,
    rows: Vec<Tuple>,
    capacity: usize,
    /// `Some` when the table was declared `Unique`: deduplicates whole rows
    /// via a hash set over the tuple's values.
    row_set: Option<HashSet<Tuple>>,
    indices: Vec<Index>,
    /// Set by the scheduler once a materialized table's dependencies have
    /// all been re-evaluated; cleared whenever the table is mutated.
    up_to_date: bool,
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Vec<DataType>, unique: bool) -> Self {
        Self::with_capacity(name, schema, unique, INITIAL_CAPACITY)
    }

    /// As [`Table::new`], but with an explicit starting capacity (rounded up
    /// to a power of two ≥ 2), used by `crate::engine::Database` to honor
    /// `EngineConfig::initial_table_capacity`.
    pub fn with_capacity(
        name: impl Into<String>,
        schema: Vec<DataType>,
        unique: bool,
        initial_capacity: usize,
    ) -> Self {
        let name = name.into();
        let capacity = initial_capacity.max(2).next_power_of_two();
        trace!(table = %name, arity = schema.len(), unique, capacity, "table_created");
        Table {
            name,
            schema,
            rows: Vec::with_capacity(capacity),
            capacity,
            row_set: if unique { Some(HashSet::new()) } else { None },
            indices: Vec::new(),
            up_to_date: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &[DataType] {
        &self.schema
    }

    pub fn is_unique(&self) -> bool {
        self.row_set.is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Tuple> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    pub fn mark_up_to_date(&mut self) {
        self.up_to_date = true;
    }

    pub fn mark_stale(&mut self) {
        self.up_to_date = false;
    }

    /// Add a key index on `column`. At most one key index may exist per
    /// column (SPEC_FULL.md I-KEY1); violating that is a programming error
    /// surfaced as a panic, since it can only happen during predicate
    /// construction, never at query time.
    pub fn add_key_index(&mut self, column: usize, priority: u32) {
        assert!(
            !self
                .indices
                .iter()
                .any(|i| i.is_keyed() && i.column() == column),
            "table '{}' already has a key index on column {column}",
            self.name
        );
        let mut index = KeyIndex::new(column, self.capacity, priority);
        for row_id in 0..self.rows.len() {
            index
                .insert(&self.rows, row_id as u32, &self.name)
                .expect("existing rows already satisfy uniqueness");
        }
        self.indices.push(Index::Keyed(index));
    }

    pub fn add_general_index(&mut self, column: usize, priority: u32) {
        let mut index = GeneralIndex::new(column, self.capacity, priority);
        for row_id in 0..self.rows.len() {
            index.insert(&self.rows, row_id as u32);
        }
        self.indices.push(Index::General(index));
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn index_for_column(&self, column: usize) -> Option<&Index> {
        self.indices.iter().find(|i| i.column() == column)
    }

    /// `true` if `row` is already present, checked via the row-set when the
    /// table is `Unique`, or by full scan otherwise.
    pub fn contains_row(&self, row: &Tuple) -> bool {
        match &self.row_set {
            Some(set) => set.contains(row),
            None => self.rows.iter().any(|r| r == row),
        }
    }

    /// Append `row`, maintaining every index and the row-set. Returns
    /// `Ok(false)` without mutating anything if the table is `Unique` and
    /// the row already exists; fails with `DuplicateKey` if a key index
    /// column collides with a distinct row.
    pub fn add(&mut self, row: Tuple) -> TedResult<bool> {
        debug_assert!(
            row.matches_schema(&self.schema),
            "row does not match table '{}' schema",
            self.name
        );
        if let Some(set) = &self.row_set {
            if set.contains(&row) {
                return Ok(false);
            }
        }
        let row_id = self.rows.len();
        if row_id == self.capacity {
            self.grow();
        }
        // Validate key indices before committing the row anywhere, so a
        // DuplicateKey error leaves the table unchanged.
        for index in &self.indices {
            if let Index::Keyed(key_index) = index {
                if key_index.probe(&self.rows, row.get(key_index.column()).unwrap()).is_some() {
                    return Err(TedError::DuplicateKey {
                        table: self.name.clone(),
                        column: key_index.column(),
                        value: row.get(key_index.column()).unwrap().clone(),
                    });
                }
            }
        }
        self.rows.push(row.clone());
        if let Some(set) = &mut self.row_set {
            set.insert(row);
        }
        for index in &mut self.indices {
            match index {
                Index::Keyed(key_index) => {
                    key_index
                        .insert(&self.rows, row_id as u32, &self.name)
                        .expect("just checked no collision exists");
                }
                Index::General(general_index) => general_index.insert(&self.rows, row_id as u32),
            }
        }
        self.up_to_date = false;
        trace!(table = %self.name, row_id, "table_row_added");
        Ok(true)
    }

    fn grow(&mut self) {
        self.capacity *= 2;
        trace!(table = %self.name, new_capacity = self.capacity, "table_grown");
        for index in &mut self.indices {
            index.rebuild(&self.rows, self.capacity);
        }
    }

    /// Remove every row, resetting indices to empty but keeping the
    /// schema and configured indices in place.
    pub fn clear(&mut self) {
        self.rows.clear();
        if let Some(set) = &mut self.row_set {
            set.clear();
        }
        self.capacity = INITIAL_CAPACITY;
        for index in &mut self.indices {
            index.rebuild(&self.rows, self.capacity);
        }
        self.up_to_date = false;
        trace!(table = %self.name, "table_cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TedValue;

    fn row(v: i64) -> Tuple {
        Tuple::new(vec![TedValue::Int(v)])
    }

    #[test]
    fn add_grows_capacity_by_power_of_two() {
        let mut t = Table::new("T", vec![DataType::Int], false);
        for i in 0..20 {
            t.add(row(i)).unwrap();
        }
        assert_eq!(t.len(), 20);
        assert_eq!(t.capacity, 32);
    }

    #[test]
    fn unique_table_drops_duplicate_rows() {
        let mut t = Table::new("T", vec![DataType::Int], true);
        assert!(t.add(row(1)).unwrap());
        assert!(!t.add(row(1)).unwrap());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn key_index_rejects_colliding_row() {
        let mut t = Table::new("ById", vec![DataType::Int, DataType::Str], false);
        t.add_key_index(0, 1000);
        t.add(Tuple::new(vec![TedValue::Int(1), TedValue::string("a")]))
            .unwrap();
        let err = t
            .add(Tuple::new(vec![TedValue::Int(1), TedValue::string("b")]))
            .unwrap_err();
        assert!(matches!(err, TedError::DuplicateKey { .. }));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn clear_resets_rows_and_indices() {
        let mut t = Table::new("T", vec![DataType::Int], false);
        t.add_general_index(0, 100);
        for i in 0..5 {
            t.add(row(i)).unwrap();
        }
        t.clear();
        assert_eq!(t.len(), 0);
        assert!(t.index_for_column(0).is_some());
    }

    #[test]
    fn general_index_survives_growth() {
        let mut t = Table::new("T", vec![DataType::Int], false);
        t.add_general_index(0, 100);
        for i in 0..40 {
            t.add(row(i % 3)).unwrap();
        }
        let Index::General(idx) = t.index_for_column(0).unwrap() else {
            panic!("expected general index");
        };
        let matches: Vec<u32> = idx.probe(t.rows(), &TedValue::Int(1)).collect();
        assert_eq!(matches.len(), 40 / 3);
    }
}
