//! Predicates: the three things a [`crate::term::VarName`] in a goal can
//! refer to when a call is compiled against it.
//!
//! SPEC_FULL.md §2 groups predicates into tables (facts, extensional or
//! materialized), primitives (built-in operations with no storage), and
//! definitions (inlined, macro-like predicate aliases). This enum is the
//! compiled rule body's view of which kind it is calling.

use std::fmt;

/// Which kind of predicate a goal's head name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    Table,
    Primitive,
    Definition,
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredicateKind::Table => "table",
            PredicateKind::Primitive => "primitive",
            PredicateKind::Definition => "definition",
        };
        f.write_str(name)
    }
}
