//! Error Types for the TED Deductive Database
//!
//! One `thiserror` enum covering every error kind the core can raise, split
//! between compile-time errors (raised while registering predicates and
//! rules) and run-time errors (raised while materializing tables).

use crate::value::TedValue;
use std::fmt;
use thiserror::Error;

/// Result type used throughout the crate.
pub type TedResult<T> = Result<T, TedError>;

/// All error kinds the core evaluator can raise.
#[derive(Error, Debug)]
pub enum TedError {
    /// A primitive or comparison received an unbound variable, or a head
    /// variable is not bound anywhere in the rule body. Raised at rule
    /// compilation time.
    #[error("instantiation error: {0}")]
    Instantiation(String),

    /// Attempted to append a row whose key-column value already exists in a
    /// keyed index. The table is left unchanged.
    #[error("duplicate key {value:?} in table '{table}' column {column}")]
    DuplicateKey {
        /// Table the row was being added to.
        table: String,
        /// Index of the key column.
        column: usize,
        /// The colliding value.
        value: TedValue,
    },

    /// Mixing manual row insertion with rule definitions on the same
    /// predicate.
    #[error("mode conflict on predicate '{0}': cannot mix manual rows and rules")]
    ModeConflict(String),

    /// The predicate dependency graph contains a cycle.
    #[error("dependency cycle detected involving predicate '{0}'")]
    Cycle(String),

    /// A numeric or comparison primitive was instantiated for a type that
    /// lacks the required operation.
    #[error("type '{type_name}' does not support operator '{op}'")]
    OperatorMissing {
        /// Name of the offending type (as reported by `TedValue::type_name`).
        type_name: &'static str,
        /// The operator that was requested.
        op: &'static str,
    },

    /// A host-raised error propagated out of `NextSolution`.
    #[error("rule '{rule}' failed at call {call_index}: {source}")]
    RuleExecution {
        /// Name of the head predicate of the failing rule.
        rule: String,
        /// Index of the call within the rule body that raised.
        call_index: usize,
        /// Snapshot of the rule-local variable bindings at failure time.
        snapshot: Vec<(String, Option<TedValue>)>,
        /// The original host error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TedError {
    /// Build a `RuleExecution` error, formatting the variable snapshot for
    /// diagnostics.
    pub fn rule_execution(
        rule: impl Into<String>,
        call_index: usize,
        snapshot: Vec<(String, Option<TedValue>)>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TedError::RuleExecution {
            rule: rule.into(),
            call_index,
            snapshot,
            source: Box::new(source),
        }
    }
}

/// Displays a cell snapshot the way `RuleExecution` diagnostics render it.
pub(crate) fn format_snapshot(snapshot: &[(String, Option<TedValue>)]) -> String {
    let mut out = String::new();
    for (name, value) in snapshot {
        if !out.is_empty() {
            out.push_str(", ");
        }
        match value {
            Some(v) => fmt::write(&mut out, format_args!("{name}={v:?}")).ok(),
            None => fmt::write(&mut out, format_args!("{name}=<unbound>")).ok(),
        };
    }
    out
}
