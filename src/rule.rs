//! Rules: a compiled head pattern plus body, immutable once built.
//!
//! SPEC_FULL.md §3: "Rule: `{head: Pattern, body: [Call], dependencies:
//! [Table], cells: [ValueCell]}`. Rules are immutable once compiled." This
//! module owns the compile step (`Rule::compile`, built on
//! `crate::analyzer::GoalAnalyzer`) and the per-materialization driver
//! (`Rule::add_all_solutions`), which builds a fresh `crate::call::Call` tree
//! against the rule's own cell arena every time the scheduler reruns it.

use crate::analyzer::{CompiledGoal, GoalAnalyzer, PredicateCatalog};
use crate::call::{self, value_of, TableLookup};
use crate::cell::CellArena;
use crate::error::TedResult;
use crate::goal::Goal;
use crate::pattern::Pattern;
use crate::table::Table;
use crate::term::Term;
use crate::value::Tuple;
use std::collections::HashSet;
use tracing::trace;

/// A compiled rule: `head.If(body)`. Drives the nested-loop backtracking
/// search over `body` and appends one row to the head table per solution.
#[derive(Debug)]
pub struct Rule {
    head_predicate: String,
    head_pattern: Pattern,
    body: CompiledGoal,
    cells: CellArena,
    dependencies: Vec<String>,
}

impl Rule {
    /// Compile `head_predicate(head_args...).If(body)` against `catalog`.
    /// Every head argument must already be bound by the time the body
    /// finishes compiling (SPEC_FULL.md §4.1); violating that raises
    /// `Instantiation`.
    pub fn compile(
        head_predicate: impl Into<String>,
        head_args: &[Term],
        body: &Goal,
        catalog: &dyn PredicateCatalog,
    ) -> TedResult<Rule> {
        let mut cells = CellArena::new();
        let compiled_body = {
            let mut analyzer = GoalAnalyzer::new(&mut cells, catalog);
            let compiled_body = analyzer.compile(body)?;
            let mut head_pattern = Vec::with_capacity(head_args.len());
            for arg in head_args {
                head_pattern.push(analyzer.compile_head_term(arg)?);
            }
            let compiled_body = analyzer.append_hoisted(compiled_body);
            (compiled_body, head_pattern)
        };
        let (body, head_pattern) = compiled_body;
        let dependencies = collect_dependencies(&body);

        Ok(Rule {
            head_predicate: head_predicate.into(),
            head_pattern,
            body,
            cells,
            dependencies,
        })
    }

    pub fn head_predicate(&self) -> &str {
        &self.head_predicate
    }

    /// Table predicates this rule's body calls into, deduplicated. The
    /// scheduler uses this to build the predicate dependency DAG
    /// (SPEC_FULL.md §3 "Predicate dependency graph").
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Drive the body to exhaustion, appending one row to `target` per
    /// solution. `tables` resolves every table this rule's body calls other
    /// than `target` itself.
    pub fn add_all_solutions(
        &self,
        target: &mut Table,
        tables: &dyn TableLookup,
    ) -> TedResult<usize> {
        let mut call = call::build(&self.body, &self.cells, tables);
        call.reset();
        let mut added = 0;
        while call.next_solution()? {
            let row = Tuple::new(
                self.head_pattern
                    .iter()
                    .map(|op| value_of(op, &self.cells))
                    .collect(),
            );
            if target.add(row)? {
                added += 1;
            }
        }
        trace!(predicate = %self.head_predicate, added, "rule_solutions_added");
        Ok(added)
    }
}

fn collect_dependencies(goal: &CompiledGoal) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_dependencies_into(goal, &mut seen, &mut out);
    out
}

fn collect_dependencies_into(goal: &CompiledGoal, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    match goal {
        CompiledGoal::TableCall { table, .. } | CompiledGoal::RandomElement { table, .. } => {
            if seen.insert(table.clone()) {
                out.push(table.clone());
            }
        }
        CompiledGoal::And(goals) => {
            for g in goals {
                collect_dependencies_into(g, seen, out);
            }
        }
        CompiledGoal::Or { branches, .. } => {
            for b in branches {
                collect_dependencies_into(b, seen, out);
            }
        }
        CompiledGoal::Not(inner) => collect_dependencies_into(inner, seen, out),
        CompiledGoal::Maximal { inner, .. } | CompiledGoal::Minimal { inner, .. } => {
            collect_dependencies_into(inner, seen, out)
        }
        CompiledGoal::Compare(..)
        | CompiledGoal::In { .. }
        | CompiledGoal::Prob(_)
        | CompiledGoal::PickRandomly { .. }
        | CompiledGoal::Eval { .. } => {}
    }
}
