//! The embedded database: the host-facing surface of SPEC_FULL.md §6.
//!
//! `Database` owns every table and rule and is the single implementor of
//! both `crate::analyzer::PredicateCatalog` (so rule bodies can be compiled
//! against it) and `crate::call::TableLookup` (so a fully materialized
//! database can itself be probed, e.g. from tests or a REPL). Declaring a
//! predicate, adding facts, and defining rules are all synchronous and
//! immediate; query results are only guaranteed fresh after `ensure_up_to_date`
//! has been called for the predicate in question (SPEC_FULL.md §4.6).

use crate::analyzer::{Definition, PredicateCatalog};
use crate::call::TableLookup;
use crate::config::EngineConfig;
use crate::error::{TedError, TedResult};
use crate::goal::Goal;
use crate::predicate::PredicateKind;
use crate::rule::Rule;
use crate::scheduler::Scheduler;
use crate::table::Table;
use crate::term::{Term, VarName};
use crate::value::{DataType, Tuple};
use std::collections::HashMap;
use tracing::{debug, trace};

/// How one column of a declared table is indexed.
#[derive(Debug, Clone, Copy)]
pub enum ColumnSpec {
    /// No index; the column can still be read, just not probed directly.
    Plain(DataType),
    /// A key index: at most one row may carry a given value in this column.
    Key(DataType),
    /// A general (non-unique) hash index.
    Indexed(DataType),
}

impl ColumnSpec {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnSpec::Plain(t) | ColumnSpec::Key(t) | ColumnSpec::Indexed(t) => *t,
        }
    }
}

/// Tracks whether a predicate has committed to manual rows or to rules, so a
/// later call of the other kind can be rejected with `ModeConflict`
/// (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredicateMode {
    Manual,
    Ruled,
}

/// The embedded deductive database. One instance owns every table, every
/// rule, and every macro-like definition registered against it.
#[derive(Debug)]
pub struct Database {
    config: EngineConfig,
    schemas: HashMap<String, Vec<DataType>>,
    tables: HashMap<String, Table>,
    rules: HashMap<String, Vec<Rule>>,
    definitions: HashMap<String, Definition>,
    mode: HashMap<String, PredicateMode>,
}

impl Database {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Database {
            config,
            schemas: HashMap::new(),
            tables: HashMap::new(),
            rules: HashMap::new(),
            definitions: HashMap::new(),
            mode: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Declare a table predicate. Must be called before any `add_row`,
    /// `if_rule`, or `fact` targeting `name`.
    ///
    /// Declaring the same predicate twice is a programming error, not a
    /// recoverable one: it can only happen while wiring up a schema, never
    /// while evaluating rules, so it panics like `Table::add_key_index`'s
    /// own duplicate-key-index check does.
    pub fn declare_table(&mut self, name: impl Into<String>, columns: &[ColumnSpec], unique: bool) {
        let name = name.into();
        assert!(
            !self.schemas.contains_key(&name),
            "predicate '{name}' already declared"
        );
        let schema: Vec<DataType> = columns.iter().map(ColumnSpec::data_type).collect();
        let mut table = Table::with_capacity(
            name.clone(),
            schema.clone(),
            unique,
            self.config.normalized_initial_capacity(),
        );
        let general_priority =
            self.config.default_general_index_priority_per_column * columns.len().max(1) as u32;
        for (column, spec) in columns.iter().enumerate() {
            match spec {
                ColumnSpec::Key(_) => {
                    table.add_key_index(column, self.config.default_keyed_index_priority)
                }
                ColumnSpec::Indexed(_) => table.add_general_index(column, general_priority),
                ColumnSpec::Plain(_) => {}
            }
        }
        debug!(predicate = %name, arity = schema.len(), unique, "predicate_declared");
        self.schemas.insert(name.clone(), schema);
        self.tables.insert(name, table);
    }

    /// Register `name(params...) Is body` as an inlined macro predicate
    /// (SPEC_FULL.md §4.1's "Definition"). Definitions are substituted into
    /// every call site at rule-compile time and never materialize a table.
    pub fn define(&mut self, name: impl Into<String>, params: Vec<(VarName, DataType)>, body: Goal) {
        let name = name.into();
        assert!(
            !self.schemas.contains_key(&name),
            "predicate '{name}' is already a table"
        );
        self.definitions.insert(name, Definition { params, body });
    }

    /// `head_predicate(head_args...).If(body)`. Compiles and registers a new
    /// rule for `head_predicate`. Raises `ModeConflict` if `head_predicate`
    /// already has manually added rows.
    pub fn if_rule(&mut self, head_predicate: &str, head_args: &[Term], body: &Goal) -> TedResult<()> {
        if self.mode.get(head_predicate) == Some(&PredicateMode::Manual) {
            return Err(TedError::ModeConflict(head_predicate.to_string()));
        }
        let rule = Rule::compile(head_predicate, head_args, body, self)?;
        if let Some(table) = self.tables.get_mut(head_predicate) {
            table.mark_stale();
        }
        self.mode.insert(head_predicate.to_string(), PredicateMode::Ruled);
        self.rules.entry(head_predicate.to_string()).or_default().push(rule);
        trace!(predicate = head_predicate, "rule_registered");
        Ok(())
    }

    /// `head_predicate(head_args...).Fact()`: a rule with an always-true
    /// (empty) body, so `head_args` must be fully instantiated.
    pub fn fact(&mut self, head_predicate: &str, head_args: &[Term]) -> TedResult<()> {
        self.if_rule(head_predicate, head_args, &Goal::And(Vec::new()))
    }

    /// Manually append a row to an extensional predicate. Raises
    /// `ModeConflict` if `predicate` already has rules defined.
    pub fn add_row(&mut self, predicate: &str, values: Vec<crate::value::TedValue>) -> TedResult<bool> {
        if self.mode.get(predicate) == Some(&PredicateMode::Ruled) {
            return Err(TedError::ModeConflict(predicate.to_string()));
        }
        let table = self
            .tables
            .get_mut(predicate)
            .unwrap_or_else(|| panic!("predicate '{predicate}' was never declared"));
        let added = table.add(Tuple::new(values))?;
        // Extensional tables are always up to date immediately after their
        // last manual append (SPEC_FULL.md §4.6).
        table.mark_up_to_date();
        self.mode.insert(predicate.to_string(), PredicateMode::Manual);
        Ok(added)
    }

    /// Recursively materialize `predicate` and everything it depends on.
    pub fn ensure_up_to_date(&mut self, predicate: &str) -> TedResult<()> {
        Scheduler::new(&mut self.tables, &self.rules).ensure_up_to_date(predicate)
    }

    pub fn len(&self, predicate: &str) -> usize {
        self.tables.get(predicate).map(Table::len).unwrap_or(0)
    }

    pub fn row(&self, predicate: &str, index: usize) -> Option<&Tuple> {
        self.tables.get(predicate)?.row(index)
    }

    pub fn rows(&self, predicate: &str) -> &[Tuple] {
        self.tables.get(predicate).map(Table::rows).unwrap_or(&[])
    }

    /// Remove every row of `predicate`, keeping its schema and indices.
    pub fn clear(&mut self, predicate: &str) {
        if let Some(table) = self.tables.get_mut(predicate) {
            table.clear();
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateCatalog for Database {
    fn kind(&self, name: &str) -> Option<PredicateKind> {
        if self.definitions.contains_key(name) {
            Some(PredicateKind::Definition)
        } else if self.schemas.contains_key(name) {
            Some(PredicateKind::Table)
        } else {
            None
        }
    }

    fn table_schema(&self, name: &str) -> Option<&[DataType]> {
        self.schemas.get(name).map(Vec::as_slice)
    }

    fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }
}

impl TableLookup for Database {
    fn table(&self, name: &str) -> &Table {
        self.tables
            .get(name)
            .unwrap_or_else(|| panic!("predicate '{name}' was never declared"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{CompareOp, Goal};
    use crate::value::TedValue;

    fn str_col() -> ColumnSpec {
        ColumnSpec::Plain(DataType::Str)
    }

    #[test]
    fn manual_rows_then_rule_is_mode_conflict() {
        let mut db = Database::new();
        db.declare_table("person", &[str_col()], false);
        db.add_row("person", vec![TedValue::string("p1")]).unwrap();

        let x = Term::Variable("X".into(), DataType::Str);
        let err = db
            .if_rule("person", &[x.clone()], &Goal::call("person", vec![x]))
            .unwrap_err();
        assert!(matches!(err, TedError::ModeConflict(_)));
    }

    #[test]
    fn rule_then_manual_row_is_mode_conflict() {
        let mut db = Database::new();
        db.declare_table("parent", &[str_col(), str_col()], false);
        db.declare_table("grand", &[str_col(), str_col()], true);
        let x = Term::Variable("X".into(), DataType::Str);
        let y = Term::Variable("Y".into(), DataType::Str);
        let z = Term::Variable("Z".into(), DataType::Str);
        let body = Goal::And(vec![
            Goal::call("parent", vec![x.clone(), y.clone()]),
            Goal::call("parent", vec![y, z.clone()]),
        ]);
        db.if_rule("grand", &[x, z], &body).unwrap();

        let err = db
            .add_row("grand", vec![TedValue::string("a"), TedValue::string("c")])
            .unwrap_err();
        assert!(matches!(err, TedError::ModeConflict(_)));
    }

    #[test]
    fn grandparent_end_to_end_through_database() {
        let mut db = Database::new();
        db.declare_table("parent", &[str_col(), str_col()], false);
        db.declare_table("grand", &[str_col(), str_col()], true);
        for (a, b) in [("a", "b"), ("b", "c"), ("a", "d")] {
            db.add_row("parent", vec![TedValue::string(a), TedValue::string(b)])
                .unwrap();
        }

        let x = Term::Variable("X".into(), DataType::Str);
        let y = Term::Variable("Y".into(), DataType::Str);
        let z = Term::Variable("Z".into(), DataType::Str);
        let body = Goal::And(vec![
            Goal::call("parent", vec![x.clone(), y.clone()]),
            Goal::call("parent", vec![y, z.clone()]),
        ]);
        db.if_rule("grand", &[x, z], &body).unwrap();

        db.ensure_up_to_date("grand").unwrap();
        assert_eq!(db.len("grand"), 1);
        assert_eq!(
            db.row("grand", 0),
            Some(&Tuple::new(vec![TedValue::string("a"), TedValue::string("c")]))
        );
    }

    #[test]
    fn fact_with_unbound_head_variable_is_instantiation_error() {
        let mut db = Database::new();
        db.declare_table("p", &[ColumnSpec::Plain(DataType::Int)], false);
        let x = Term::Variable("X".into(), DataType::Int);
        let err = db.fact("p", &[x]).unwrap_err();
        assert!(matches!(err, TedError::Instantiation(_)));
    }

    #[test]
    fn fact_with_constant_head_inserts_one_row() {
        let mut db = Database::new();
        db.declare_table("p", &[ColumnSpec::Plain(DataType::Int)], true);
        db.fact("p", &[Term::Constant(TedValue::Int(7))]).unwrap();
        db.ensure_up_to_date("p").unwrap();
        assert_eq!(db.len("p"), 1);
        assert_eq!(db.row("p", 0), Some(&Tuple::new(vec![TedValue::Int(7)])));
    }

    #[test]
    fn clear_resets_an_extensional_table() {
        let mut db = Database::new();
        db.declare_table("person", &[str_col()], false);
        db.add_row("person", vec![TedValue::string("p1")]).unwrap();
        db.clear("person");
        assert_eq!(db.len("person"), 0);
    }

    #[test]
    fn definition_inlines_without_materializing_a_table() {
        let mut db = Database::new();
        db.declare_table("num", &[ColumnSpec::Plain(DataType::Int)], false);
        for v in 1..=5 {
            db.add_row("num", vec![TedValue::Int(v)]).unwrap();
        }
        let x = Term::Variable("X".into(), DataType::Int);
        db.define(
            "big",
            vec![("X".into(), DataType::Int)],
            Goal::Compare(CompareOp::Gt, x.clone(), Term::Constant(TedValue::Int(3))),
        );

        db.declare_table("result", &[ColumnSpec::Plain(DataType::Int)], true);
        let body = Goal::And(vec![
            Goal::call("num", vec![x.clone()]),
            Goal::call("big", vec![x.clone()]),
        ]);
        db.if_rule("result", &[x], &body).unwrap();
        db.ensure_up_to_date("result").unwrap();
        assert_eq!(db.len("result"), 2);
        assert!(!db.schemas.contains_key("big"));
    }
}
