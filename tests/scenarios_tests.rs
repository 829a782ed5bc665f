//! Concrete end-to-end scenarios exercising join, negation, comparison,
//! duplicate-key rejection, aggregation, and whole-row uniqueness together
//! through the public `Database` surface.

use ted::engine::{ColumnSpec, Database};
use ted::error::TedError;
use ted::goal::{CompareOp, Goal};
use ted::table::Table;
use ted::term::Term;
use ted::value::{DataType, TedValue, Tuple};

fn str_col() -> ColumnSpec {
    ColumnSpec::Plain(DataType::Str)
}

#[test]
fn s1_ancestor_one_step() {
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
fn s2_negation() {
    let mut db = Database::new();
    db.declare_table("person", &[str_col()], false);
    db.declare_table("dead", &[str_col()], false);
    db.declare_table("alive", &[str_col()], true);

    for name in ["p1", "p2", "p3"] {
        db.add_row("person", vec![TedValue::string(name)]).unwrap();
    }
    db.add_row("dead", vec![TedValue::string("p2")]).unwrap();

    let x = Term::Variable("X".into(), DataType::Str);
    let body = Goal::And(vec![
        Goal::call("person", vec![x.clone()]),
        Goal::Not(Box::new(Goal::call("dead", vec![x.clone()]))),
    ]);
    db.if_rule("alive", &[x], &body).unwrap();
    db.ensure_up_to_date("alive").unwrap();

    assert_eq!(db.len("alive"), 2);
    assert!(db.rows("alive").contains(&Tuple::new(vec![TedValue::string("p1")])));
    assert!(db.rows("alive").contains(&Tuple::new(vec![TedValue::string("p3")])));
}

#[test]
fn s3_comparison() {
    let mut db = Database::new();
    db.declare_table("num", &[ColumnSpec::Plain(DataType::Int)], false);
    db.declare_table("big", &[ColumnSpec::Plain(DataType::Int)], true);
    for v in 1..=5 {
        db.add_row("num", vec![TedValue::Int(v)]).unwrap();
    }

    let x = Term::Variable("X".into(), DataType::Int);
    let body = Goal::And(vec![
        Goal::call("num", vec![x.clone()]),
        Goal::Compare(CompareOp::Gt, x.clone(), Term::Constant(TedValue::Int(3))),
    ]);
    db.if_rule("big", &[x], &body).unwrap();
    db.ensure_up_to_date("big").unwrap();

    assert_eq!(db.len("big"), 2);
    assert!(db.rows("big").contains(&Tuple::new(vec![TedValue::Int(4)])));
    assert!(db.rows("big").contains(&Tuple::new(vec![TedValue::Int(5)])));
}

#[test]
fn s4_key_duplicate_leaves_table_unchanged() {
    let mut t = Table::new("by_id", vec![DataType::Int, DataType::Str], false);
    t.add_key_index(0, 1000);
    t.add(Tuple::new(vec![TedValue::Int(1), TedValue::string("a")]))
        .unwrap();
    let err = t
        .add(Tuple::new(vec![TedValue::Int(1), TedValue::string("b")]))
        .unwrap_err();
    assert!(matches!(err, TedError::DuplicateKey { .. }));
    assert_eq!(t.len(), 1);
    assert_eq!(
        t.row(0),
        Some(&Tuple::new(vec![TedValue::Int(1), TedValue::string("a")]))
    );
}

#[test]
fn s5_maximal_picks_best_utility() {
    let mut db = Database::new();
    db.declare_table(
        "person",
        &[str_col(), ColumnSpec::Plain(DataType::Int)],
        false,
    );
    db.declare_table(
        "best",
        &[str_col(), ColumnSpec::Plain(DataType::Int)],
        true,
    );
    for (name, score) in [("p1", 10), ("p2", 30), ("p3", 20)] {
        db.add_row("person", vec![TedValue::string(name), TedValue::Int(score)])
            .unwrap();
    }

    let x = Term::Variable("X".into(), DataType::Str);
    let u = Term::Variable("U".into(), DataType::Int);
    let body = Goal::Maximal {
        utility: u.clone(),
        inner: Box::new(Goal::call("person", vec![x.clone(), u.clone()])),
    };
    db.if_rule("best", &[x, u], &body).unwrap();
    db.ensure_up_to_date("best").unwrap();

    assert_eq!(db.len("best"), 1);
    assert_eq!(
        db.row("best", 0),
        Some(&Tuple::new(vec![TedValue::string("p2"), TedValue::Int(30)]))
    );
}

#[test]
fn s7_random_element_binds_a_row_from_a_table() {
    let mut db = Database::new();
    db.declare_table(
        "choice",
        &[ColumnSpec::Plain(DataType::Int), ColumnSpec::Plain(DataType::Int)],
        false,
    );
    db.declare_table(
        "picked",
        &[ColumnSpec::Plain(DataType::Int), ColumnSpec::Plain(DataType::Int)],
        true,
    );
    for (a, b) in [(1, 10), (2, 20), (3, 30)] {
        db.add_row("choice", vec![TedValue::Int(a), TedValue::Int(b)]).unwrap();
    }

    let x = Term::Variable("X".into(), DataType::Int);
    let y = Term::Variable("Y".into(), DataType::Int);
    let body = Goal::RandomElement {
        predicate: "choice".to_string(),
        args: vec![x.clone(), y.clone()],
    };
    db.if_rule("picked", &[x, y], &body).unwrap();
    db.ensure_up_to_date("picked").unwrap();

    assert_eq!(db.len("picked"), 1);
    let row = db.row("picked", 0).unwrap();
    assert!(db.rows("choice").contains(row));
}

#[test]
fn s8_pick_randomly_binds_one_of_the_explicit_values() {
    let mut db = Database::new();
    db.declare_table("picked", &[ColumnSpec::Plain(DataType::Int)], true);

    let x = Term::Variable("X".into(), DataType::Int);
    let body = Goal::PickRandomly {
        out: x.clone(),
        values: vec![
            Term::Constant(TedValue::Int(7)),
            Term::Constant(TedValue::Int(8)),
            Term::Constant(TedValue::Int(9)),
        ],
    };
    db.if_rule("picked", &[x], &body).unwrap();
    db.ensure_up_to_date("picked").unwrap();

    assert_eq!(db.len("picked"), 1);
    let row = db.row("picked", 0).unwrap();
    assert!([7, 8, 9]
        .into_iter()
        .any(|v| row == &Tuple::new(vec![TedValue::Int(v)])));
}

#[test]
fn s6_unique_flag_drops_duplicate_inserts() {
    let mut t = Table::new(
        "triples",
        vec![DataType::Int, DataType::Int, DataType::Int],
        true,
    );
    for _ in 0..10 {
        t.add(Tuple::new(vec![TedValue::Int(1), TedValue::Int(2), TedValue::Int(3)]))
            .unwrap();
    }
    assert_eq!(t.len(), 1);
}
