//! The `Call` protocol: a uniform `Reset`/`NextSolution` interface over
//! table scans, index probes, and every built-in primitive.
//!
//! SPEC_FULL.md §4.3/§4.4 describe this as the runtime counterpart of a
//! compiled goal: each `Call` holds whatever state it needs to resume a
//! backtracking search (a cursor into a table, an index iterator, the best
//! solution seen so far) and exposes exactly two operations. `crate::rule`
//! builds a `Call` tree from a `crate::analyzer::CompiledGoal` once, when a
//! rule is registered; the tree is then reset and driven many times as the
//! scheduler materializes the rule's table.

use crate::analyzer::CompiledGoal;
use crate::cell::{CellArena, CellId};
use crate::error::{TedError, TedResult};
use crate::goal::CompareOp;
use crate::index::{GeneralIndexIter, Index};
use crate::pattern::{MatchOperation, Mode, Pattern};
use crate::table::Table;
use crate::value::{TedValue, Tuple};
use rand::Rng;

/// Resolves a table predicate name to its live storage. Implemented by
/// `crate::engine::Database`.
pub trait TableLookup {
    fn table(&self, name: &str) -> &Table;
}

/// The backtracking search protocol every compiled goal implements.
pub trait Call<'a> {
    /// Restart this call's search from the beginning.
    fn reset(&mut self);

    /// Advance to the next solution, binding every `Write` cell along the
    /// way. Returns `false` once the search is exhausted.
    fn next_solution(&mut self) -> TedResult<bool>;
}

pub(crate) fn value_of(op: &MatchOperation, cells: &CellArena) -> TedValue {
    match op.mode {
        Mode::Read => cells
            .get(op.cell.expect("Read match operation always carries a cell"))
            .expect("Read match operation's cell is bound before the call runs"),
        Mode::Constant => op
            .constant
            .clone()
            .expect("Constant match operation always carries a value"),
        Mode::Write | Mode::Ignore => {
            panic!("value_of called on a non-instantiated match operation")
        }
    }
}

fn resolve_list(op: &MatchOperation, cells: &CellArena) -> TedResult<Vec<TedValue>> {
    match value_of(op, cells) {
        TedValue::List(items) => Ok(items.as_ref().clone()),
        other => Err(TedError::OperatorMissing {
            type_name: other.type_name(),
            op: "collection operand",
        }),
    }
}

fn row_matches(row: &Tuple, pattern: &Pattern, cells: &CellArena) -> bool {
    pattern.iter().enumerate().all(|(i, op)| match op.mode {
        Mode::Write | Mode::Ignore => true,
        Mode::Read => cells.get(op.cell.unwrap()).as_ref() == row.get(i),
        Mode::Constant => op.constant.as_ref() == row.get(i),
    })
}

fn bind_writes(row: &Tuple, pattern: &Pattern, cells: &CellArena) {
    for (i, op) in pattern.iter().enumerate() {
        if op.mode == Mode::Write {
            cells.set(op.cell.unwrap(), row.get(i).unwrap().clone());
        }
    }
}

fn instantiated_row(pattern: &Pattern, cells: &CellArena) -> Tuple {
    Tuple::new(pattern.iter().map(|op| value_of(op, cells)).collect())
}

/// Unique-row presence test: top access-path priority, selected when every
/// argument is instantiated and the table declares `Unique`.
struct RowSetProbe<'a> {
    table: &'a Table,
    pattern: &'a Pattern,
    cells: &'a CellArena,
    done: bool,
}

impl<'a> Call<'a> for RowSetProbe<'a> {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        let candidate = instantiated_row(self.pattern, self.cells);
        Ok(self.table.contains_row(&candidate))
    }
}

/// Probe a key index on one instantiated column, binding the rest of the
/// row's columns on success. Succeeds at most once.
struct KeyIndexProbe<'a> {
    table: &'a Table,
    column: usize,
    pattern: &'a Pattern,
    cells: &'a CellArena,
    done: bool,
}

impl<'a> Call<'a> for KeyIndexProbe<'a> {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        let Some(Index::Keyed(index)) = self.table.index_for_column(self.column) else {
            panic!("KeyIndexProbe built against a non-key index");
        };
        let key = value_of(&self.pattern[self.column], self.cells);
        let Some(row_id) = index.probe(self.table.rows(), &key) else {
            return Ok(false);
        };
        let row = self.table.row(row_id as usize).unwrap();
        if !row_matches(row, self.pattern, self.cells) {
            return Ok(false);
        }
        bind_writes(row, self.pattern, self.cells);
        Ok(true)
    }
}

/// Scan every row sharing a general index's column value.
struct GeneralIndexScan<'a> {
    table: &'a Table,
    column: usize,
    pattern: &'a Pattern,
    cells: &'a CellArena,
    iter: Option<GeneralIndexIter<'a>>,
}

impl<'a> Call<'a> for GeneralIndexScan<'a> {
    fn reset(&mut self) {
        self.iter = None;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.iter.is_none() {
            let Some(Index::General(index)) = self.table.index_for_column(self.column) else {
                panic!("GeneralIndexScan built against a non-general index");
            };
            let key = value_of(&self.pattern[self.column], self.cells);
            self.iter = Some(index.probe(self.table.rows(), &key));
        }
        let iter = self.iter.as_mut().unwrap();
        for row_id in iter {
            let row = self.table.row(row_id as usize).unwrap();
            if row_matches(row, self.pattern, self.cells) {
                bind_writes(row, self.pattern, self.cells);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Linear scan over every row, used when no usable index exists (lowest
/// access-path priority).
struct FullScan<'a> {
    table: &'a Table,
    pattern: &'a Pattern,
    cells: &'a CellArena,
    next_row: usize,
}

impl<'a> Call<'a> for FullScan<'a> {
    fn reset(&mut self) {
        self.next_row = 0;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        while self.next_row < self.table.len() {
            let row = self.table.row(self.next_row).unwrap();
            self.next_row += 1;
            if row_matches(row, self.pattern, self.cells) {
                bind_writes(row, self.pattern, self.cells);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Selects the cheapest access path for a table call's instantiation
/// pattern, per SPEC_FULL.md §4.3's priority order: `RowSetProbe` >
/// `KeyIndexProbe` > `GeneralIndexScan` > `FullScan`, ties within the
/// index tiers broken by each index's configured priority.
fn build_table_call<'a>(
    table: &'a Table,
    pattern: &'a Pattern,
    cells: &'a CellArena,
) -> Box<dyn Call<'a> + 'a> {
    let fully_instantiated = pattern.iter().all(MatchOperation::is_instantiated);
    if table.is_unique() && fully_instantiated {
        return Box::new(RowSetProbe {
            table,
            pattern,
            cells,
            done: false,
        });
    }

    let mut candidates: Vec<&Index> = table
        .indices()
        .iter()
        .filter(|idx| pattern[idx.column()].is_instantiated())
        .collect();
    candidates.sort_by(|a, b| b.priority().cmp(&a.priority()));

    match candidates.first() {
        Some(Index::Keyed(k)) => Box::new(KeyIndexProbe {
            table,
            column: k.column(),
            pattern,
            cells,
            done: false,
        }),
        Some(Index::General(g)) => Box::new(GeneralIndexScan {
            table,
            column: g.column(),
            pattern,
            cells,
            iter: None,
        }),
        None => Box::new(FullScan {
            table,
            pattern,
            cells,
            next_row: 0,
        }),
    }
}

/// Nested-loop backtracking conjunction: advances the rightmost call on
/// each step, backing off to the previous call when a call is exhausted,
/// per SPEC_FULL.md §4.4.
struct AndCall<'a> {
    calls: Vec<Box<dyn Call<'a> + 'a>>,
    cursor: usize,
    started: bool,
}

impl<'a> Call<'a> for AndCall<'a> {
    fn reset(&mut self) {
        for call in &mut self.calls {
            call.reset();
        }
        self.cursor = 0;
        self.started = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.calls.is_empty() {
            if self.started {
                return Ok(false);
            }
            self.started = true;
            return Ok(true);
        }
        let last = self.calls.len() - 1;
        if !self.started {
            self.started = true;
            self.cursor = 0;
        } else {
            self.cursor = last;
        }
        loop {
            if self.calls[self.cursor].next_solution()? {
                if self.cursor == last {
                    return Ok(true);
                }
                self.cursor += 1;
                self.calls[self.cursor].reset();
            } else {
                if self.cursor == 0 {
                    return Ok(false);
                }
                self.cursor -= 1;
            }
        }
    }
}

/// Disjunction: branches run independently; a shared variable is exported
/// only when every branch bound it (`CompiledGoal::Or::exports`).
struct OrCall<'a> {
    branches: Vec<Box<dyn Call<'a> + 'a>>,
    exports: Vec<(CellId, Vec<CellId>)>,
    cells: &'a CellArena,
    active: usize,
}

impl<'a> Call<'a> for OrCall<'a> {
    fn reset(&mut self) {
        for branch in &mut self.branches {
            branch.reset();
        }
        self.active = 0;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        while self.active < self.branches.len() {
            if self.branches[self.active].next_solution()? {
                for (exported, sources) in &self.exports {
                    if let Some(value) = self.cells.get(sources[self.active]) {
                        self.cells.set(*exported, value);
                    }
                }
                return Ok(true);
            }
            self.active += 1;
        }
        Ok(false)
    }
}

/// Negation as failure: succeeds exactly once if `inner` has no solutions.
struct NotCall<'a> {
    inner: Box<dyn Call<'a> + 'a>,
    done: bool,
}

impl<'a> Call<'a> for NotCall<'a> {
    fn reset(&mut self) {
        self.inner.reset();
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        self.inner.reset();
        Ok(!self.inner.next_solution()?)
    }
}

struct CompareCall<'a> {
    op: CompareOp,
    lhs: &'a MatchOperation,
    rhs: &'a MatchOperation,
    cells: &'a CellArena,
    done: bool,
}

impl<'a> Call<'a> for CompareCall<'a> {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        let lhs = value_of(self.lhs, self.cells);
        let rhs = value_of(self.rhs, self.cells);
        Ok(match self.op {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        })
    }
}

/// Membership test (element already instantiated) or generate (element is
/// a fresh `Write` cell), per SPEC_FULL.md's resolution of the `In`
/// collection-instantiation open question.
struct InCall<'a> {
    element: &'a MatchOperation,
    collection: &'a MatchOperation,
    cells: &'a CellArena,
    next_index: usize,
    done_test: bool,
}

impl<'a> Call<'a> for InCall<'a> {
    fn reset(&mut self) {
        self.next_index = 0;
        self.done_test = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        let list = resolve_list(self.collection, self.cells)?;
        if self.element.is_instantiated() {
            if self.done_test {
                return Ok(false);
            }
            self.done_test = true;
            let target = value_of(self.element, self.cells);
            Ok(list.iter().any(|v| *v == target))
        } else {
            while self.next_index < list.len() {
                let value = list[self.next_index].clone();
                self.next_index += 1;
                if let Some(cell) = self.element.cell {
                    self.cells.set(cell, value);
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Binds `pattern` against one uniformly random row of `table`. Fails if
/// the table is empty or if the randomly chosen row doesn't satisfy a
/// Read/Constant column in `pattern`; succeeds at most once, the same
/// cardinality as `RowSetProbe`/`KeyIndexProbe`.
struct RandomElementCall<'a> {
    table: &'a Table,
    pattern: &'a Pattern,
    cells: &'a CellArena,
    done: bool,
}

impl<'a> Call<'a> for RandomElementCall<'a> {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        if self.table.is_empty() {
            return Ok(false);
        }
        let index = rand::thread_rng().gen_range(0..self.table.len());
        let row = self.table.row(index).unwrap();
        if !row_matches(row, self.pattern, self.cells) {
            return Ok(false);
        }
        bind_writes(row, self.pattern, self.cells);
        Ok(true)
    }
}

/// Binds `out` once to a uniformly random element of `values`. Succeeds at
/// most once, like `ProbCall`.
struct PickRandomlyCall<'a> {
    out: CellId,
    values: &'a [MatchOperation],
    cells: &'a CellArena,
    done: bool,
}

impl<'a> Call<'a> for PickRandomlyCall<'a> {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        if self.values.is_empty() {
            return Ok(false);
        }
        let index = rand::thread_rng().gen_range(0..self.values.len());
        let value = value_of(&self.values[index], self.cells);
        self.cells.set(self.out, value);
        Ok(true)
    }
}

struct EvalCall<'a> {
    out: CellId,
    op: crate::term::ArithOp,
    operands: &'a [MatchOperation],
    cells: &'a CellArena,
    done: bool,
}

impl<'a> Call<'a> for EvalCall<'a> {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        let mut operands = self.operands.iter();
        let mut acc = value_of(
            operands.next().expect("Eval always has at least one operand"),
            self.cells,
        );
        for operand in operands {
            let value = value_of(operand, self.cells);
            acc = acc.apply_arith(self.op, &value)?;
        }
        self.cells.set(self.out, acc);
        Ok(true)
    }
}

/// Shared implementation of `Maximal`/`Minimal`: exhaustively drives `inner`
/// and keeps the tracked cells' values from whichever solution had the
/// best utility. `gotOne` (here `best` being `None`) seeds the first
/// solution unconditionally, resolving the "undefined initial bestUtil"
/// open question.
struct AggregateCall<'a> {
    inner: Box<dyn Call<'a> + 'a>,
    utility: &'a MatchOperation,
    tracked_cells: &'a [CellId],
    cells: &'a CellArena,
    maximize: bool,
    done: bool,
}

impl<'a> Call<'a> for AggregateCall<'a> {
    fn reset(&mut self) {
        self.inner.reset();
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        self.inner.reset();
        let mut best: Option<TedValue> = None;
        let mut best_snapshot: Vec<(CellId, TedValue)> = Vec::new();
        while self.inner.next_solution()? {
            let utility = value_of(self.utility, self.cells);
            let better = match &best {
                None => true,
                Some(current) => {
                    if self.maximize {
                        utility > *current
                    } else {
                        utility < *current
                    }
                }
            };
            if better {
                best_snapshot = self
                    .tracked_cells
                    .iter()
                    .filter_map(|&cell| self.cells.get(cell).map(|v| (cell, v)))
                    .collect();
                best = Some(utility);
            }
        }
        if best.is_none() {
            return Ok(false);
        }
        for (cell, value) in best_snapshot {
            self.cells.set(cell, value);
        }
        Ok(true)
    }
}

struct ProbCall {
    p: f64,
    done: bool,
}

impl<'a> Call<'a> for ProbCall {
    fn reset(&mut self) {
        self.done = false;
    }

    fn next_solution(&mut self) -> TedResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        Ok(rand::thread_rng().gen_bool(self.p.clamp(0.0, 1.0)))
    }
}

/// Build a runnable `Call` tree from a compiled goal, resolving table
/// names to live storage through `tables`.
pub fn build<'a>(
    goal: &'a CompiledGoal,
    cells: &'a CellArena,
    tables: &'a dyn TableLookup,
) -> Box<dyn Call<'a> + 'a> {
    match goal {
        CompiledGoal::TableCall { table, pattern } => {
            build_table_call(tables.table(table), pattern, cells)
        }
        CompiledGoal::And(goals) => {
            let calls = goals.iter().map(|g| build(g, cells, tables)).collect();
            Box::new(AndCall {
                calls,
                cursor: 0,
                started: false,
            })
        }
        CompiledGoal::Or { branches, exports } => {
            let calls = branches.iter().map(|g| build(g, cells, tables)).collect();
            let exports = exports
                .iter()
                .map(|(_, exported, sources)| (*exported, sources.clone()))
                .collect();
            Box::new(OrCall {
                branches: calls,
                exports,
                cells,
                active: 0,
            })
        }
        CompiledGoal::Not(inner) => Box::new(NotCall {
            inner: build(inner, cells, tables),
            done: false,
        }),
        CompiledGoal::Compare(op, lhs, rhs) => Box::new(CompareCall {
            op: *op,
            lhs,
            rhs,
            cells,
            done: false,
        }),
        CompiledGoal::In { element, collection } => Box::new(InCall {
            element,
            collection,
            cells,
            next_index: 0,
            done_test: false,
        }),
        CompiledGoal::Prob(p) => Box::new(ProbCall { p: *p, done: false }),
        CompiledGoal::RandomElement { table, pattern } => Box::new(RandomElementCall {
            table: tables.table(table),
            pattern,
            cells,
            done: false,
        }),
        CompiledGoal::PickRandomly { out, values } => Box::new(PickRandomlyCall {
            out: *out,
            values,
            cells,
            done: false,
        }),
        CompiledGoal::Eval { out, op, operands } => Box::new(EvalCall {
            out: *out,
            op: *op,
            operands,
            cells,
            done: false,
        }),
        CompiledGoal::Maximal {
            utility,
            inner,
            tracked_cells,
        } => Box::new(AggregateCall {
            inner: build(inner, cells, tables),
            utility,
            tracked_cells,
            cells,
            maximize: true,
            done: false,
        }),
        CompiledGoal::Minimal {
            utility,
            inner,
            tracked_cells,
        } => Box::new(AggregateCall {
            inner: build(inner, cells, tables),
            utility,
            tracked_cells,
            cells,
            maximize: false,
            done: false,
        }),
    }
}
