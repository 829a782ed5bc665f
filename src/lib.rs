//! # TED — a typed, embedded deductive database
//!
//! TED evaluates Datalog-style rules over in-memory tables: declare a table
//! predicate, populate it by hand or with `head.If(body)` rules, and call
//! `Database::ensure_up_to_date` to bring a predicate's table up to date by
//! re-running every rule that (transitively) feeds it.
//!
//! ## Pipeline
//!
//! ```text
//! Goal (host-constructed AST)
//!     |
//! [GoalAnalyzer]             -> CompiledGoal (modes resolved, cells allocated,
//!     |                         functional expressions hoisted, definitions
//!     |                         inlined)
//! [Rule::compile]            -> Rule (head pattern + compiled body)
//!     |
//! [Scheduler::ensure_up_to_date] -> walks the predicate dependency DAG,
//!     |                         detecting cycles, re-running stale rules
//!     v
//! [Rule::add_all_solutions]  -> drives a Call tree (crate::call) to
//!                               exhaustion, appending one row per solution
//! ```
//!
//! ## Example
//!
//! ```
//! use ted::engine::{ColumnSpec, Database};
//! use ted::term::Term;
//! use ted::goal::Goal;
//! use ted::value::{DataType, TedValue};
//!
//! let mut db = Database::new();
//! db.declare_table("parent", &[ColumnSpec::Plain(DataType::Str), ColumnSpec::Plain(DataType::Str)], false);
//! db.declare_table("grand", &[ColumnSpec::Plain(DataType::Str), ColumnSpec::Plain(DataType::Str)], true);
//!
//! db.add_row("parent", vec![TedValue::string("alice"), TedValue::string("bob")]).unwrap();
//! db.add_row("parent", vec![TedValue::string("bob"), TedValue::string("cora")]).unwrap();
//!
//! let x = Term::Variable("X".into(), DataType::Str);
//! let y = Term::Variable("Y".into(), DataType::Str);
//! let z = Term::Variable("Z".into(), DataType::Str);
//! let body = Goal::And(vec![
//!     Goal::call("parent", vec![x.clone(), y.clone()]),
//!     Goal::call("parent", vec![y, z.clone()]),
//! ]);
//! db.if_rule("grand", &[x, z], &body).unwrap();
//!
//! db.ensure_up_to_date("grand").unwrap();
//! assert_eq!(db.len("grand"), 1);
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |---|---|
//! | `value` | `TedValue`, `Tuple`, `DataType` — the runtime type system |
//! | `term` | `Term`: the AST a goal's arguments are written in |
//! | `goal` | `Goal`: the AST a rule body is written in |
//! | `pattern` | `MatchOperation`/`Mode`: the compiled, per-argument form of a `Term` |
//! | `cell` | `CellArena`/`CellId`: per-rule mutable value slots |
//! | `predicate` | `PredicateKind`: table, primitive, or definition |
//! | `analyzer` | Mode analysis, hoisting, definition inlining: `Goal` -> `CompiledGoal` |
//! | `index` | Hash indices (keyed and general) over a table's rows |
//! | `table` | Append-only row storage plus indices |
//! | `call` | The `Call` trait and its `Reset`/`NextSolution` backtracking tree |
//! | `rule` | `Rule`: a compiled head pattern and body |
//! | `scheduler` | Bottom-up, cycle-checked rule re-evaluation |
//! | `engine` | `Database`: the public, host-facing API |
//! | `config` | `EngineConfig`: storage-layer tunables |
//! | `error` | `TedError`/`TedResult`: the crate's error taxonomy |

pub mod analyzer;
pub mod call;
pub mod cell;
pub mod config;
pub mod engine;
pub mod error;
pub mod goal;
pub mod index;
pub mod pattern;
pub mod predicate;
pub mod rule;
pub mod scheduler;
pub mod table;
pub mod term;
pub mod value;

pub use config::EngineConfig;
pub use engine::{ColumnSpec, Database};
pub use error::{TedError, TedResult};
pub use goal::Goal;
pub use term::Term;
pub use value::{DataType, TedValue, Tuple};
