//! # Value Type System
//!
//! `TedValue` is the single runtime-tagged value type every column, term,
//! and cell in the engine is built on (see SPEC_FULL.md §3, "Column typing").
//! This plays the role the host's external type contract does in §6: it
//! supplies `Eq`/`Hash` for every variant and a total `Ord` for the
//! comparison primitives, plus arithmetic via [`TedValue::apply_arith`].
//!
//! ```
//! use ted::value::{TedValue, Tuple, DataType};
//!
//! let row = Tuple::new(vec![TedValue::Int(1), TedValue::string("hello")]);
//! assert_eq!(row.arity(), 2);
//! assert_eq!(row.get(0), Some(&TedValue::Int(1)));
//! ```

use crate::error::{TedError, TedResult};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

mod intern;
pub use intern::intern_string;

/// Data type tag for a column or term. Carried alongside every `Variable`
/// and checked against a table's schema on `Table::add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Float,
    Bool,
    Str,
    /// The element type of a `List` value, used by `In`'s collection operand
    /// and aggregation (SPEC_FULL.md §4.3's host-callback surface).
    List,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "Int",
            DataType::Float => "Float",
            DataType::Bool => "Bool",
            DataType::Str => "Str",
            DataType::List => "List",
        };
        f.write_str(name)
    }
}

/// A single typed value. Strings are `Arc<str>` so that interned constants
/// (see [`intern_string`]) can be cloned cheaply and compared by pointer
/// where that matters for performance, while still comparing by content for
/// correctness.
#[derive(Debug, Clone)]
pub enum TedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    /// A list of values, used as the collection operand of `In`. Shared via
    /// `Arc` since the same collection is typically probed many times across
    /// backtracking.
    List(Arc<Vec<TedValue>>),
}

impl TedValue {
    /// Convenience constructor that interns the string.
    pub fn string(s: impl AsRef<str>) -> Self {
        TedValue::Str(intern_string(s.as_ref()))
    }

    pub fn list(values: Vec<TedValue>) -> Self {
        TedValue::List(Arc::new(values))
    }

    /// The data type tag for this value.
    pub fn data_type(&self) -> DataType {
        match self {
            TedValue::Int(_) => DataType::Int,
            TedValue::Float(_) => DataType::Float,
            TedValue::Bool(_) => DataType::Bool,
            TedValue::Str(_) => DataType::Str,
            TedValue::List(_) => DataType::List,
        }
    }

    /// Name used in `OperatorMissing` diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            TedValue::Int(_) => "Int",
            TedValue::Float(_) => "Float",
            TedValue::Bool(_) => "Bool",
            TedValue::Str(_) => "Str",
            TedValue::List(_) => "List",
        }
    }

    fn numeric_pair(&self, other: &TedValue, op: &'static str) -> TedResult<(f64, f64, bool)> {
        match (self, other) {
            (TedValue::Int(a), TedValue::Int(b)) => Ok((*a as f64, *b as f64, true)),
            (TedValue::Float(a), TedValue::Float(b)) => Ok((*a, *b, false)),
            (TedValue::Int(a), TedValue::Float(b)) => Ok((*a as f64, *b, false)),
            (TedValue::Float(a), TedValue::Int(b)) => Ok((*a, *b as f64, false)),
            _ => Err(TedError::OperatorMissing {
                type_name: self.type_name(),
                op,
            }),
        }
    }

    /// Apply a binary arithmetic operator (see [`crate::term::ArithOp`]).
    /// This is the static capability table the §9 design note calls for in
    /// place of runtime operator reflection.
    pub fn apply_arith(&self, op: crate::term::ArithOp, other: &TedValue) -> TedResult<TedValue> {
        use crate::term::ArithOp::*;
        match op {
            Add | Sub | Mul | Div | Mod => {
                let (a, b, both_int) = self.numeric_pair(other, op.name())?;
                let result = match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => {
                        if b == 0.0 {
                            return Err(TedError::OperatorMissing {
                                type_name: self.type_name(),
                                op: "division by zero",
                            });
                        }
                        a / b
                    }
                    Mod => {
                        if b == 0.0 {
                            return Err(TedError::OperatorMissing {
                                type_name: self.type_name(),
                                op: "modulo by zero",
                            });
                        }
                        a % b
                    }
                    _ => unreachable!(),
                };
                if both_int && matches!(op, Add | Sub | Mul | Mod) {
                    Ok(TedValue::Int(result as i64))
                } else {
                    Ok(TedValue::Float(result))
                }
            }
            BitAnd | BitOr | BitXor => match (self, other) {
                (TedValue::Int(a), TedValue::Int(b)) => Ok(TedValue::Int(match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    BitXor => a ^ b,
                    _ => unreachable!(),
                })),
                _ => Err(TedError::OperatorMissing {
                    type_name: self.type_name(),
                    op: op.name(),
                }),
            },
        }
    }

    /// Apply unary negation.
    pub fn apply_neg(&self) -> TedResult<TedValue> {
        match self {
            TedValue::Int(a) => Ok(TedValue::Int(-a)),
            TedValue::Float(a) => Ok(TedValue::Float(-a)),
            _ => Err(TedError::OperatorMissing {
                type_name: self.type_name(),
                op: "neg",
            }),
        }
    }
}

impl fmt::Display for TedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TedValue::Int(v) => write!(f, "{v}"),
            TedValue::Float(v) => write!(f, "{v}"),
            TedValue::Bool(v) => write!(f, "{v}"),
            TedValue::Str(v) => write!(f, "{v}"),
            TedValue::List(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl PartialEq for TedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TedValue::Int(a), TedValue::Int(b)) => a == b,
            (TedValue::Float(a), TedValue::Float(b)) => a.to_bits() == b.to_bits(),
            (TedValue::Bool(a), TedValue::Bool(b)) => a == b,
            (TedValue::Str(a), TedValue::Str(b)) => a == b,
            (TedValue::List(a), TedValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TedValue {}

impl Hash for TedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TedValue::Int(v) => v.hash(state),
            TedValue::Float(v) => v.to_bits().hash(state),
            TedValue::Bool(v) => v.hash(state),
            TedValue::Str(v) => v.hash(state),
            TedValue::List(v) => v.hash(state),
        }
    }
}

impl PartialOrd for TedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TedValue::Int(a), TedValue::Int(b)) => a.cmp(b),
            (TedValue::Float(a), TedValue::Float(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (TedValue::Int(a), TedValue::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (TedValue::Float(a), TedValue::Int(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (TedValue::Bool(a), TedValue::Bool(b)) => a.cmp(b),
            (TedValue::Str(a), TedValue::Str(b)) => a.cmp(b),
            // Cross-type comparisons (other than the numeric widening above)
            // fall back to ordering by type tag, so `Ord` stays total even
            // though the comparison primitives reject mismatched types
            // before reaching here (see calls::Compare).
            _ => type_rank(self).cmp(&type_rank(other)),
        }
    }
}

fn type_rank(v: &TedValue) -> u8 {
    match v.data_type() {
        DataType::Int => 0,
        DataType::Float => 1,
        DataType::Bool => 2,
        DataType::Str => 3,
        DataType::List => 4,
    }
}

/// A row: an ordered, fixed-arity sequence of typed values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple(Vec<TedValue>);

impl Tuple {
    pub fn new(values: Vec<TedValue>) -> Self {
        Tuple(values)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&TedValue> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[TedValue] {
        &self.0
    }

    /// Validate this tuple's arity and per-column types against a schema.
    pub fn matches_schema(&self, schema: &[DataType]) -> bool {
        self.0.len() == schema.len()
            && self
                .0
                .iter()
                .zip(schema.iter())
                .all(|(v, t)| v.data_type() == *t)
    }
}
