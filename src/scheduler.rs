//! Bottom-up rule scheduler.
//!
//! SPEC_FULL.md §4.6: "`EnsureUpToDate()` on a table first recursively
//! ensures its dependencies, then — if the table is intensional — clears its
//! current rows and reruns every rule's `AddAllSolutions`." Cycle detection
//! (§3 "Predicate dependency graph ... required to be acyclic") happens on
//! the same recursive walk, via a three-color DFS so a cycle is reported
//! with the predicate name it was discovered at.

use crate::call::TableLookup;
use crate::error::{TedError, TedResult};
use crate::rule::Rule;
use crate::table::Table;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

/// Drives `EnsureUpToDate` for one predicate against a set of tables and
/// their rules. Implemented as a free-standing driver rather than a method
/// on `crate::engine::Database` so it can borrow the database's table map
/// mutably while holding the rule map immutably for the whole walk.
pub struct Scheduler<'a> {
    tables: &'a mut HashMap<String, Table>,
    rules: &'a HashMap<String, Vec<Rule>>,
    visiting: HashMap<String, VisitState>,
}

impl<'a> Scheduler<'a> {
    pub fn new(tables: &'a mut HashMap<String, Table>, rules: &'a HashMap<String, Vec<Rule>>) -> Self {
        Scheduler {
            tables,
            rules,
            visiting: HashMap::new(),
        }
    }

    /// Ensure `predicate` and every predicate it (transitively) depends on
    /// are up to date, re-running intensional rules bottom-up.
    pub fn ensure_up_to_date(&mut self, predicate: &str) -> TedResult<()> {
        match self.visiting.get(predicate) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::Visiting) => {
                return Err(TedError::Cycle(predicate.to_string()));
            }
            None => {}
        }
        if self
            .tables
            .get(predicate)
            .map(Table::is_up_to_date)
            .unwrap_or(false)
        {
            self.visiting.insert(predicate.to_string(), VisitState::Done);
            return Ok(());
        }

        self.visiting
            .insert(predicate.to_string(), VisitState::Visiting);

        let rules: &'a HashMap<String, Vec<Rule>> = self.rules;
        if let Some(rule_list) = rules.get(predicate) {
            for rule in rule_list {
                debug!(predicate, dependencies = ?rule.dependencies(), "scheduler_ensuring_dependency");
                for dep in rule.dependencies() {
                    self.ensure_up_to_date(dep)?;
                }
            }
            self.materialize(predicate, rule_list)?;
        }

        self.visiting.insert(predicate.to_string(), VisitState::Done);
        if let Some(table) = self.tables.get(predicate) {
            info!(predicate, rows = table.len(), "scheduler_table_materialized");
        }
        Ok(())
    }

    fn materialize(&mut self, predicate: &str, rules: &[Rule]) -> TedResult<()> {
        if let Some(table) = self.tables.get_mut(predicate) {
            table.clear();
        }
        for rule in rules {
            let (mut target, lookup) = split_target(self.tables, predicate);
            let result = rule.add_all_solutions(&mut target, &lookup);
            self.tables.insert(predicate.to_string(), target);
            result?;
        }
        if let Some(table) = self.tables.get_mut(predicate) {
            table.mark_up_to_date();
        }
        Ok(())
    }
}

/// Temporarily remove `predicate`'s table from the map so it can be passed
/// to `Rule::add_all_solutions` as a mutable target while every other table
/// remains available through `tables` for the rule's own body to read.
fn split_target<'a>(
    tables: &'a mut HashMap<String, Table>,
    predicate: &str,
) -> (Table, MapLookup<'a>) {
    let target = tables
        .remove(predicate)
        .unwrap_or_else(|| panic!("predicate '{predicate}' has no table registered"));
    (target, MapLookup(tables))
}

struct MapLookup<'a>(&'a HashMap<String, Table>);

impl<'a> TableLookup for MapLookup<'a> {
    fn table(&self, name: &str) -> &Table {
        self.0
            .get(name)
            .unwrap_or_else(|| panic!("predicate '{name}' has no table registered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Definition, PredicateCatalog};
    use crate::goal::Goal;
    use crate::predicate::PredicateKind;
    use crate::term::Term;
    use crate::value::{DataType, TedValue, Tuple};

    struct TestCatalog {
        tables: HashMap<String, Vec<DataType>>,
    }

    impl PredicateCatalog for TestCatalog {
        fn kind(&self, name: &str) -> Option<PredicateKind> {
            self.tables.contains_key(name).then_some(PredicateKind::Table)
        }
        fn table_schema(&self, name: &str) -> Option<&[DataType]> {
            self.tables.get(name).map(|v| v.as_slice())
        }
        fn definition(&self, _name: &str) -> Option<&Definition> {
            None
        }
    }

    #[test]
    fn transitive_dependency_materializes_before_dependent() {
        let mut schema = HashMap::new();
        schema.insert("parent".to_string(), vec![DataType::Str, DataType::Str]);
        schema.insert("grand".to_string(), vec![DataType::Str, DataType::Str]);
        let catalog = TestCatalog { tables: schema };

        let mut parent = Table::new("parent", vec![DataType::Str, DataType::Str], false);
        for (a, b) in [("a", "b"), ("b", "c")] {
            parent
                .add(Tuple::new(vec![TedValue::string(a), TedValue::string(b)]))
                .unwrap();
        }
        parent.mark_up_to_date();
        let grand = Table::new("grand", vec![DataType::Str, DataType::Str], true);

        let x = Term::Variable("X".into(), DataType::Str);
        let y = Term::Variable("Y".into(), DataType::Str);
        let z = Term::Variable("Z".into(), DataType::Str);
        let body = Goal::And(vec![
            Goal::call("parent", vec![x.clone(), y.clone()]),
            Goal::call("parent", vec![y, z.clone()]),
        ]);
        let rule = Rule::compile("grand", &[x, z], &body, &catalog).unwrap();

        let mut tables = HashMap::new();
        tables.insert("parent".to_string(), parent);
        tables.insert("grand".to_string(), grand);
        let mut rules = HashMap::new();
        rules.insert("grand".to_string(), vec![rule]);

        let mut scheduler = Scheduler::new(&mut tables, &rules);
        scheduler.ensure_up_to_date("grand").unwrap();

        let grand = &tables["grand"];
        assert!(grand.is_up_to_date());
        assert_eq!(grand.len(), 1);
        assert!(grand.contains_row(&Tuple::new(vec![TedValue::string("a"), TedValue::string("c")])));
    }

    #[test]
    fn cyclic_dependency_is_detected() {
        let mut schema = HashMap::new();
        schema.insert("a".to_string(), vec![DataType::Int]);
        schema.insert("b".to_string(), vec![DataType::Int]);
        let catalog = TestCatalog { tables: schema };

        let x = Term::Variable("X".into(), DataType::Int);
        let rule_a = Rule::compile("a", &[x.clone()], &Goal::call("b", vec![x.clone()]), &catalog).unwrap();
        let rule_b = Rule::compile("b", &[x.clone()], &Goal::call("a", vec![x]), &catalog).unwrap();

        let mut tables = HashMap::new();
        tables.insert("a".to_string(), Table::new("a", vec![DataType::Int], true));
        tables.insert("b".to_string(), Table::new("b", vec![DataType::Int], true));
        let mut rules = HashMap::new();
        rules.insert("a".to_string(), vec![rule_a]);
        rules.insert("b".to_string(), vec![rule_b]);

        let mut scheduler = Scheduler::new(&mut tables, &rules);
        let err = scheduler.ensure_up_to_date("a").unwrap_err();
        assert!(matches!(err, TedError::Cycle(_)));
    }

    #[test]
    fn already_up_to_date_table_is_not_rematerialized() {
        let mut table = Table::new("fact", vec![DataType::Int], false);
        table.add(Tuple::new(vec![TedValue::Int(1)])).unwrap();
        table.mark_up_to_date();

        let mut tables = HashMap::new();
        tables.insert("fact".to_string(), table);
        let rules: HashMap<String, Vec<Rule>> = HashMap::new();

        let mut scheduler = Scheduler::new(&mut tables, &rules);
        scheduler.ensure_up_to_date("fact").unwrap();
        assert_eq!(tables["fact"].len(), 1);
    }
}
