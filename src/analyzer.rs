//! Goal analysis: left-to-right mode inference, functional-expression
//! hoisting, and definition inlining.
//!
//! SPEC_FULL.md §4.1/§4.2 describe this pass: walk a rule body left to
//! right, classifying every argument occurrence as Read (already bound),
//! Write (first occurrence), Constant, or Ignore; along the way, hoist
//! `FunctionalExpression` operands into inserted `Eval` goals, and inline
//! `Definition` calls by substituting the call's actual arguments for the
//! definition's formal parameters before re-entering mode analysis on the
//! substituted body. The analyzer never looks at table or index contents —
//! that happens later, at `Call` construction time (`crate::call`), once
//! live tables exist.

use crate::cell::{CellArena, CellId};
use crate::error::{TedError, TedResult};
use crate::goal::{CompareOp, Goal};
use crate::pattern::{MatchOperation, Pattern};
use crate::predicate::PredicateKind;
use crate::term::{ArithOp, Term, VarName};
use crate::value::DataType;
use std::collections::HashMap;

/// A macro-like predicate alias: `name(params...) Is body`.
#[derive(Debug, Clone)]
pub struct Definition {
    pub params: Vec<(VarName, DataType)>,
    pub body: Goal,
}

/// Everything the analyzer needs to know about predicates other than the
/// one currently being compiled. Implemented by `crate::engine::Database`.
pub trait PredicateCatalog {
    fn kind(&self, name: &str) -> Option<PredicateKind>;
    fn table_schema(&self, name: &str) -> Option<&[DataType]>;
    fn definition(&self, name: &str) -> Option<&Definition>;
}

/// The compiled counterpart of a [`Goal`] tree: variables resolved to
/// [`CellId`]s, functional expressions hoisted, definitions inlined.
#[derive(Debug)]
pub enum CompiledGoal {
    TableCall {
        table: String,
        pattern: Pattern,
    },
    And(Vec<CompiledGoal>),
    /// `exports` lists variables bound in every branch: the exported cell
    /// they share, and each branch's own cell for that variable (aligned by
    /// index with `branches`). Populated only for names that came out of
    /// every branch as a fresh Write.
    Or {
        branches: Vec<CompiledGoal>,
        exports: Vec<(VarName, CellId, Vec<CellId>)>,
    },
    Not(Box<CompiledGoal>),
    Compare(CompareOp, MatchOperation, MatchOperation),
    In {
        element: MatchOperation,
        collection: MatchOperation,
    },
    Prob(f64),
    RandomElement {
        table: String,
        pattern: Pattern,
    },
    PickRandomly {
        out: CellId,
        values: Vec<MatchOperation>,
    },
    Eval {
        out: CellId,
        op: ArithOp,
        operands: Vec<MatchOperation>,
    },
    Maximal {
        utility: MatchOperation,
        inner: Box<CompiledGoal>,
        tracked_cells: Vec<CellId>,
    },
    Minimal {
        utility: MatchOperation,
        inner: Box<CompiledGoal>,
        tracked_cells: Vec<CellId>,
    },
}

/// Compiles one rule body against a fresh [`CellArena`].
///
/// `head_vars` seeds the bound-variable map with the head pattern's
/// variables so the body can both consume and further bind them; the
/// caller (`crate::rule`) is responsible for verifying every head variable
/// ends up bound by the time the body is fully compiled.
pub struct GoalAnalyzer<'a> {
    cells: &'a mut CellArena,
    bound: HashMap<VarName, CellId>,
    catalog: &'a dyn PredicateCatalog,
    /// `Eval` goals produced by hoisting a functional expression out of the
    /// goal currently being compiled; drained and spliced in front of that
    /// goal by [`GoalAnalyzer::with_hoisted`].
    hoisted: Vec<CompiledGoal>,
}

impl<'a> GoalAnalyzer<'a> {
    pub fn new(cells: &'a mut CellArena, catalog: &'a dyn PredicateCatalog) -> Self {
        GoalAnalyzer {
            cells,
            bound: HashMap::new(),
            catalog,
            hoisted: Vec::new(),
        }
    }

    /// Wrap `goal` with any `Eval`s hoisted while compiling it, in the order
    /// they were hoisted (outermost functional expression last).
    fn with_hoisted(&mut self, goal: CompiledGoal) -> CompiledGoal {
        if self.hoisted.is_empty() {
            return goal;
        }
        let mut sequence = std::mem::take(&mut self.hoisted);
        sequence.push(goal);
        CompiledGoal::And(sequence)
    }

    pub fn bound_vars(&self) -> &HashMap<VarName, CellId> {
        &self.bound
    }

    /// Append any `Eval`s hoisted while compiling the rule head's arguments
    /// after `body`, so they run once the body has produced its bindings
    /// (used by `crate::rule::Rule::compile` for head arguments that are
    /// functional expressions, e.g. `Grand(x, y + 1)`).
    pub(crate) fn append_hoisted(&mut self, body: CompiledGoal) -> CompiledGoal {
        if self.hoisted.is_empty() {
            return body;
        }
        let mut sequence = vec![body];
        sequence.append(&mut self.hoisted);
        CompiledGoal::And(sequence)
    }

    /// Compile a full rule body, which may be a single goal or an implicit
    /// top-level conjunction; callers pass `Goal::And(goals)` for the latter.
    pub fn compile(&mut self, goal: &Goal) -> TedResult<CompiledGoal> {
        match goal {
            Goal::Call { predicate, args } => self.compile_call(predicate, args),
            Goal::And(goals) => {
                let mut compiled = Vec::with_capacity(goals.len());
                for g in goals {
                    compiled.push(self.compile(g)?);
                }
                Ok(CompiledGoal::And(compiled))
            }
            Goal::Or(branches) => self.compile_or(branches),
            Goal::Not(inner) => {
                // Negated scope: fork the bound-variable view so bindings
                // made inside never leak to the surrounding rule body.
                let mut child = GoalAnalyzer {
                    cells: self.cells,
                    bound: self.bound.clone(),
                    catalog: self.catalog,
                    hoisted: Vec::new(),
                };
                let compiled = child.compile(inner)?;
                Ok(CompiledGoal::Not(Box::new(compiled)))
            }
            Goal::Compare(op, lhs, rhs) => {
                let lhs = self.compile_instantiated_term(lhs, op.name())?;
                let rhs = self.compile_instantiated_term(rhs, op.name())?;
                let goal = CompiledGoal::Compare(*op, lhs, rhs);
                Ok(self.with_hoisted(goal))
            }
            Goal::In { element, collection } => {
                let collection = self.compile_instantiated_term(collection, "In")?;
                let element = self.compile_term(element)?;
                let goal = CompiledGoal::In { element, collection };
                Ok(self.with_hoisted(goal))
            }
            Goal::Prob(p) => Ok(CompiledGoal::Prob(*p)),
            Goal::RandomElement { predicate, args } => {
                let goal = self.compile_random_element(predicate, args)?;
                Ok(self.with_hoisted(goal))
            }
            Goal::PickRandomly { out, values } => {
                let mut compiled_values = Vec::with_capacity(values.len());
                for value in values {
                    compiled_values.push(self.compile_instantiated_term(value, "PickRandomly")?);
                }
                let out_cell = self.bind_write_term(out)?;
                let goal = CompiledGoal::PickRandomly {
                    out: out_cell,
                    values: compiled_values,
                };
                Ok(self.with_hoisted(goal))
            }
            Goal::Eval { out, op, operands } => {
                let mut compiled_operands = Vec::with_capacity(operands.len());
                for operand in operands {
                    compiled_operands.push(self.compile_instantiated_term(operand, op.name())?);
                }
                let out_cell = self.bind_write_term(out)?;
                let goal = CompiledGoal::Eval {
                    out: out_cell,
                    op: *op,
                    operands: compiled_operands,
                };
                Ok(self.with_hoisted(goal))
            }
            Goal::Maximal { utility, inner } => {
                let (utility_op, inner_goal, tracked) = self.compile_aggregate(utility, inner)?;
                let goal = CompiledGoal::Maximal {
                    utility: utility_op,
                    inner: Box::new(inner_goal),
                    tracked_cells: tracked,
                };
                Ok(self.with_hoisted(goal))
            }
            Goal::Minimal { utility, inner } => {
                let (utility_op, inner_goal, tracked) = self.compile_aggregate(utility, inner)?;
                let goal = CompiledGoal::Minimal {
                    utility: utility_op,
                    inner: Box::new(inner_goal),
                    tracked_cells: tracked,
                };
                Ok(self.with_hoisted(goal))
            }
        }
    }

    /// Compile a rule head argument: like any other instantiated term, every
    /// variable must already be bound by the body (SPEC_FULL.md §4.1's "a
    /// variable appears in the head but is never bound in the body" error).
    pub(crate) fn compile_head_term(&mut self, term: &Term) -> TedResult<MatchOperation> {
        self.compile_instantiated_term(term, "rule head")
    }

    fn compile_aggregate(
        &mut self,
        utility: &Term,
        inner: &Goal,
    ) -> TedResult<(MatchOperation, CompiledGoal, Vec<CellId>)> {
        let inner_compiled = self.compile(inner)?;
        let tracked = collect_write_cells(&inner_compiled);
        let utility_op = self.compile_instantiated_term(utility, "Maximal/Minimal")?;
        Ok((utility_op, inner_compiled, tracked))
    }

    fn compile_or(&mut self, branches: &[Goal]) -> TedResult<CompiledGoal> {
        let outer_bound = self.bound.clone();
        let mut compiled_branches = Vec::with_capacity(branches.len());
        let mut newly_bound_per_branch: Vec<HashMap<VarName, CellId>> = Vec::with_capacity(branches.len());
        for branch in branches {
            let mut child = GoalAnalyzer {
                cells: self.cells,
                bound: outer_bound.clone(),
                catalog: self.catalog,
                hoisted: Vec::new(),
            };
            let compiled = child.compile(branch)?;
            let fresh: HashMap<VarName, CellId> = child
                .bound
                .iter()
                .filter(|(name, _)| !outer_bound.contains_key(*name))
                .map(|(n, c)| (n.clone(), *c))
                .collect();
            newly_bound_per_branch.push(fresh);
            compiled_branches.push(compiled);
        }

        let mut exports = Vec::new();
        if let Some(first) = newly_bound_per_branch.first() {
            for name in first.keys() {
                if newly_bound_per_branch.iter().all(|m| m.contains_key(name)) {
                    let ty = self
                        .cells
                        .data_type(*newly_bound_per_branch[0].get(name).unwrap());
                    let exported_cell = self.cells.alloc(name.clone(), ty);
                    let sources = newly_bound_per_branch
                        .iter()
                        .map(|m| *m.get(name).unwrap())
                        .collect();
                    exports.push((name.clone(), exported_cell, sources));
                }
            }
        }
        for (name, exported_cell, _) in &exports {
            self.bound.insert(name.clone(), *exported_cell);
        }

        Ok(CompiledGoal::Or {
            branches: compiled_branches,
            exports,
        })
    }

    fn compile_call(&mut self, predicate: &str, args: &[Term]) -> TedResult<CompiledGoal> {
        match self.catalog.kind(predicate) {
            Some(PredicateKind::Table) => {
                let schema = self.catalog.table_schema(predicate).ok_or_else(|| {
                    TedError::Instantiation(format!("unknown table predicate '{predicate}'"))
                })?;
                if schema.len() != args.len() {
                    return Err(TedError::Instantiation(format!(
                        "predicate '{predicate}' expects {} argument(s), got {}",
                        schema.len(),
                        args.len()
                    )));
                }
                let mut pattern = Vec::with_capacity(args.len());
                for arg in args {
                    pattern.push(self.compile_term(arg)?);
                }
                Ok(CompiledGoal::TableCall {
                    table: predicate.to_string(),
                    pattern,
                })
            }
            Some(PredicateKind::Primitive) => Err(TedError::Instantiation(format!(
                "'{predicate}' is a built-in primitive and must be written with its own goal form"
            ))),
            Some(PredicateKind::Definition) => {
                let definition = self.catalog.definition(predicate).ok_or_else(|| {
                    TedError::Instantiation(format!("unknown definition '{predicate}'"))
                })?;
                if definition.params.len() != args.len() {
                    return Err(TedError::Instantiation(format!(
                        "definition '{predicate}' expects {} argument(s), got {}",
                        definition.params.len(),
                        args.len()
                    )));
                }
                let subst: HashMap<VarName, Term> = definition
                    .params
                    .iter()
                    .zip(args.iter())
                    .map(|((name, _), term)| (name.clone(), term.clone()))
                    .collect();
                let inlined = substitute_goal(&definition.body, &subst);
                self.compile(&inlined)
            }
            None => Err(TedError::Instantiation(format!(
                "unknown predicate '{predicate}'"
            ))),
        }
    }

    /// Compile `RandomElement(predicate, args...)`: `predicate` must name a
    /// table (never a primitive or a definition), and `args` is compiled the
    /// same way `compile_call`'s table branch compiles a `Goal::Call`'s
    /// arguments — one `MatchOperation` per column, in whatever mix of
    /// Read/Write/Constant/Ignore modes the rule body needs.
    fn compile_random_element(&mut self, predicate: &str, args: &[Term]) -> TedResult<CompiledGoal> {
        match self.catalog.kind(predicate) {
            Some(PredicateKind::Table) => {
                let schema = self.catalog.table_schema(predicate).ok_or_else(|| {
                    TedError::Instantiation(format!("unknown table predicate '{predicate}'"))
                })?;
                if schema.len() != args.len() {
                    return Err(TedError::Instantiation(format!(
                        "'RandomElement' predicate '{predicate}' expects {} argument(s), got {}",
                        schema.len(),
                        args.len()
                    )));
                }
                let mut pattern = Vec::with_capacity(args.len());
                for arg in args {
                    pattern.push(self.compile_term(arg)?);
                }
                Ok(CompiledGoal::RandomElement {
                    table: predicate.to_string(),
                    pattern,
                })
            }
            _ => Err(TedError::Instantiation(format!(
                "'RandomElement' requires '{predicate}' to be a table predicate"
            ))),
        }
    }

    /// Compile a term into a match operation, allocating a fresh Write cell
    /// on first occurrence of a variable. `_` is always Ignore.
    fn compile_term(&mut self, term: &Term) -> TedResult<MatchOperation> {
        match term {
            Term::Constant(v) => Ok(MatchOperation::constant(v.clone())),
            Term::Variable(name, ty) => {
                if name == "_" {
                    return Ok(MatchOperation::ignore());
                }
                if let Some(cell) = self.bound.get(name) {
                    Ok(MatchOperation::read(*cell))
                } else {
                    let cell = self.cells.alloc(name.clone(), *ty);
                    self.bound.insert(name.clone(), cell);
                    Ok(MatchOperation::write(cell))
                }
            }
            Term::FunctionalExpression(_, _) => {
                // Functional expressions are never directly writable; they
                // must be hoisted through `compile_instantiated_term`.
                Err(TedError::Instantiation(
                    "functional expression used where a variable or constant was expected".into(),
                ))
            }
        }
    }

    /// Compile a term that must be instantiated by the time its containing
    /// call runs: variables must already be bound, constants are always
    /// fine, and functional expressions are hoisted into an implicit Eval
    /// evaluated immediately before use, per SPEC_FULL.md §4.2. This method
    /// only returns the match operation for the *caller's* site; any hoisted
    /// Eval goals are recorded by returning a `Read` over the cell the hoist
    /// wrote into, with the hoist itself threaded through
    /// `hoisted` so callers that build a sequence (And) can splice it in.
    ///
    /// Since this analyzer compiles one call at a time rather than
    /// rewriting the surrounding `And`, hoists are resolved eagerly: the
    /// functional expression is evaluated via a single-shot internal
    /// `Eval` whose result cell is allocated fresh and bound immediately
    /// (this is equivalent to inserting the Eval goal directly before the
    /// current goal, since both run once per entry to this scope and nest
    /// at the same point in the body).
    fn compile_instantiated_term(
        &mut self,
        term: &Term,
        op_context: &'static str,
    ) -> TedResult<MatchOperation> {
        match term {
            Term::Constant(v) => Ok(MatchOperation::constant(v.clone())),
            Term::Variable(name, _) => {
                if name == "_" {
                    return Err(TedError::Instantiation(format!(
                        "'{op_context}' requires an instantiated value, got '_'"
                    )));
                }
                match self.bound.get(name) {
                    Some(cell) => Ok(MatchOperation::read(*cell)),
                    None => Err(TedError::Instantiation(format!(
                        "'{op_context}' requires variable '{name}' to already be bound"
                    ))),
                }
            }
            Term::FunctionalExpression(_, _) => {
                let cell = self.hoist_functional_expression(term)?;
                Ok(MatchOperation::read(cell))
            }
        }
    }

    /// Recursively hoists a functional expression tree into fresh cells,
    /// returning the cell holding the outermost operator's result. Used by
    /// `compile_instantiated_term`; the resulting cell bindings are
    /// evaluated at `Call` construction time via `CompiledGoal::Eval`
    /// nodes stashed on the analyzer and replayed in order before the
    /// call that needed them (see `crate::rule::Rule::compile`).
    fn hoist_functional_expression(&mut self, term: &Term) -> TedResult<CellId> {
        let (op, operands) = match term {
            Term::FunctionalExpression(op, operands) => (*op, operands),
            _ => unreachable!("only called for FunctionalExpression"),
        };
        let mut compiled_operands = Vec::with_capacity(operands.len());
        for operand in operands {
            compiled_operands.push(self.compile_instantiated_term(operand, op.name())?);
        }
        let ty = term.data_type().unwrap_or(DataType::Int);
        let cell = self.cells.alloc(format!("$eval{}", self.hoisted.len()), ty);
        self.hoisted.push(CompiledGoal::Eval {
            out: cell,
            op,
            operands: compiled_operands,
        });
        Ok(cell)
    }

    fn bind_write_term(&mut self, term: &Term) -> TedResult<CellId> {
        match term {
            Term::Variable(name, ty) if name != "_" => {
                if let Some(cell) = self.bound.get(name) {
                    Ok(*cell)
                } else {
                    let cell = self.cells.alloc(name.clone(), *ty);
                    self.bound.insert(name.clone(), cell);
                    Ok(cell)
                }
            }
            _ => Err(TedError::Instantiation(
                "destination of Eval/PickRandomly must be a named variable".into(),
            )),
        }
    }
}

/// Substitute every `Term::Variable` named in `subst` throughout `goal`,
/// implementing definition inlining (non-recursive macro expansion).
fn substitute_goal(goal: &Goal, subst: &HashMap<VarName, Term>) -> Goal {
    match goal {
        Goal::Call { predicate, args } => Goal::Call {
            predicate: predicate.clone(),
            args: args.iter().map(|t| substitute_term(t, subst)).collect(),
        },
        Goal::And(goals) => Goal::And(goals.iter().map(|g| substitute_goal(g, subst)).collect()),
        Goal::Or(goals) => Goal::Or(goals.iter().map(|g| substitute_goal(g, subst)).collect()),
        Goal::Not(inner) => Goal::Not(Box::new(substitute_goal(inner, subst))),
        Goal::Compare(op, lhs, rhs) => {
            Goal::Compare(*op, substitute_term(lhs, subst), substitute_term(rhs, subst))
        }
        Goal::In { element, collection } => Goal::In {
            element: substitute_term(element, subst),
            collection: substitute_term(collection, subst),
        },
        Goal::Prob(p) => Goal::Prob(*p),
        Goal::RandomElement { predicate, args } => Goal::RandomElement {
            predicate: predicate.clone(),
            args: args.iter().map(|t| substitute_term(t, subst)).collect(),
        },
        Goal::PickRandomly { out, values } => Goal::PickRandomly {
            out: substitute_term(out, subst),
            values: values.iter().map(|t| substitute_term(t, subst)).collect(),
        },
        Goal::Eval { out, op, operands } => Goal::Eval {
            out: substitute_term(out, subst),
            op: *op,
            operands: operands.iter().map(|t| substitute_term(t, subst)).collect(),
        },
        Goal::Maximal { utility, inner } => Goal::Maximal {
            utility: substitute_term(utility, subst),
            inner: Box::new(substitute_goal(inner, subst)),
        },
        Goal::Minimal { utility, inner } => Goal::Minimal {
            utility: substitute_term(utility, subst),
            inner: Box::new(substitute_goal(inner, subst)),
        },
    }
}

fn substitute_term(term: &Term, subst: &HashMap<VarName, Term>) -> Term {
    match term {
        Term::Variable(name, _) => subst.get(name).cloned().unwrap_or_else(|| term.clone()),
        Term::Constant(_) => term.clone(),
        Term::FunctionalExpression(op, operands) => Term::FunctionalExpression(
            *op,
            operands.iter().map(|t| substitute_term(t, subst)).collect(),
        ),
    }
}

/// Collect every `Write`-mode cell appearing anywhere in a compiled goal
/// tree, used by `Maximal`/`Minimal` to know which cells to snapshot and
/// restore around the best solution found so far.
fn collect_write_cells(goal: &CompiledGoal) -> Vec<CellId> {
    let mut out = Vec::new();
    collect_write_cells_into(goal, &mut out);
    out
}

fn collect_from_pattern(pattern: &Pattern, out: &mut Vec<CellId>) {
    for op in pattern {
        if op.mode == crate::pattern::Mode::Write {
            if let Some(cell) = op.cell {
                out.push(cell);
            }
        }
    }
}

fn collect_write_cells_into(goal: &CompiledGoal, out: &mut Vec<CellId>) {
    match goal {
        CompiledGoal::TableCall { pattern, .. } => collect_from_pattern(pattern, out),
        CompiledGoal::And(goals) => {
            for g in goals {
                collect_write_cells_into(g, out);
            }
        }
        CompiledGoal::Or { branches, exports } => {
            for b in branches {
                collect_write_cells_into(b, out);
            }
            for (_, exported, _) in exports {
                out.push(*exported);
            }
        }
        CompiledGoal::Not(_) => {}
        CompiledGoal::Compare(_, _, _) => {}
        CompiledGoal::In { element, .. } => collect_from_pattern(&vec![element.clone()], out),
        CompiledGoal::Prob(_) => {}
        CompiledGoal::RandomElement { pattern, .. } => collect_from_pattern(pattern, out),
        CompiledGoal::PickRandomly { out: cell, .. } => out.push(*cell),
        CompiledGoal::Eval { out: cell, .. } => out.push(*cell),
        CompiledGoal::Maximal { inner, .. } | CompiledGoal::Minimal { inner, .. } => {
            collect_write_cells_into(inner, out)
        }
    }
}
