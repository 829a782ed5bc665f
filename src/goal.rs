//! Goals: the user-facing AST a rule body is written in.
//!
//! A [`Goal`] tree is what the host passes to [`crate::engine::Predicate::if_`]
//! (SPEC_FULL.md §4/§6). The goal analyzer (`crate::analyzer`) walks it
//! left to right, compiling each leaf into a [`crate::call::Call`] against
//! freshly allocated or already-bound [`crate::cell::CellId`]s.

use crate::term::{ArithOp, Term};

/// Comparison operator for the `Compare` goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A node in a rule body, as constructed by the host through the public API.
#[derive(Debug, Clone)]
pub enum Goal {
    /// Call into a table or definition predicate: `name(args...)`.
    Call {
        predicate: String,
        args: Vec<Term>,
    },
    /// Conjunction: every branch must find a solution (nested-loop
    /// backtracking, SPEC_FULL.md §4.4).
    And(Vec<Goal>),
    /// Disjunction: branches run independently; bound only if every branch
    /// binds the same variables (SPEC_FULL.md invariant for `Or`).
    Or(Vec<Goal>),
    /// Negation as failure: succeeds exactly once if `inner` has no
    /// solutions, otherwise fails.
    Not(Box<Goal>),
    /// Binary comparison; both operands must already be instantiated.
    Compare(CompareOp, Term, Term),
    /// Membership test/generate: `var In collection`. The collection operand
    /// must be instantiated (Open Question OQ-1 in SPEC_FULL.md resolves in
    /// favor of requiring it); `element` may be Read (membership test) or
    /// Write (generate each member as a solution).
    In {
        element: Term,
        collection: Term,
    },
    /// Succeeds with probability `p` (0.0..=1.0), consuming one source of
    /// randomness per `NextSolution` call.
    Prob(f64),
    /// Binds `args` against one uniformly random row of `predicate`'s table
    /// (fails if the table is empty). `args` is a schema-shaped pattern
    /// exactly like `Goal::Call`'s: a column may be written, read back for
    /// equality, pinned to a constant, or ignored. Succeeds at most once.
    RandomElement {
        predicate: String,
        args: Vec<Term>,
    },
    /// Binds `out` once to a uniform random element of the explicit value
    /// list `values`; every element must already be instantiated. Succeeds
    /// at most once, the same cardinality as `Prob`/`RandomElement`.
    PickRandomly {
        out: Term,
        values: Vec<Term>,
    },
    /// Evaluate a functional expression, binding its result to `out`. The
    /// analyzer inserts these automatically when hoisting
    /// `Term::FunctionalExpression` operands out of other goals
    /// (SPEC_FULL.md §4.2); hosts may also construct them directly.
    Eval {
        out: Term,
        op: ArithOp,
        operands: Vec<Term>,
    },
    /// Exhaustively search `inner`, keeping the solution with the largest
    /// `utility` value bound at the end of each branch.
    Maximal {
        utility: Term,
        inner: Box<Goal>,
    },
    /// As `Maximal`, but keeps the smallest `utility`.
    Minimal {
        utility: Term,
        inner: Box<Goal>,
    },
}

impl Goal {
    pub fn call(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Goal::Call {
            predicate: predicate.into(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DataType, TedValue};

    #[test]
    fn call_constructor() {
        let g = Goal::call("edge", vec![Term::Variable("X".into(), DataType::Int)]);
        assert!(matches!(g, Goal::Call { .. }));
    }

    #[test]
    fn compare_op_names() {
        assert_eq!(CompareOp::Ge.name(), ">=");
    }

    #[test]
    fn nested_goal_tree_builds() {
        let g = Goal::And(vec![
            Goal::call("p", vec![Term::Constant(TedValue::Int(1))]),
            Goal::Not(Box::new(Goal::call("q", vec![]))),
        ]);
        match g {
            Goal::And(branches) => assert_eq!(branches.len(), 2),
            _ => panic!("expected And"),
        }
    }
}
