use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ted::engine::{ColumnSpec, Database};
use ted::goal::Goal;
use ted::term::Term;
use ted::value::{DataType, TedValue};

fn build_chain_database(edges: usize) -> Database {
    let mut db = Database::new();
    db.declare_table(
        "edge",
        &[ColumnSpec::Indexed(DataType::Int), ColumnSpec::Plain(DataType::Int)],
        false,
    );
    for i in 0..edges {
        db.add_row("edge", vec![TedValue::Int(i as i64), TedValue::Int(i as i64 + 1)])
            .unwrap();
    }
    db.declare_table(
        "two_hop",
        &[ColumnSpec::Plain(DataType::Int), ColumnSpec::Plain(DataType::Int)],
        true,
    );
    let x = Term::Variable("X".into(), DataType::Int);
    let y = Term::Variable("Y".into(), DataType::Int);
    let z = Term::Variable("Z".into(), DataType::Int);
    let body = Goal::And(vec![
        Goal::call("edge", vec![x.clone(), y.clone()]),
        Goal::call("edge", vec![y, z.clone()]),
    ]);
    db.if_rule("two_hop", &[x, z], &body).unwrap();
    db
}

fn bench_two_hop_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_hop_join");
    for size in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut db = build_chain_database(size);
                db.ensure_up_to_date("two_hop").unwrap();
                black_box(db.len("two_hop"))
            });
        });
    }
    group.finish();
}

fn bench_rematerialize_unchanged(c: &mut Criterion) {
    let mut db = build_chain_database(1_000);
    db.ensure_up_to_date("two_hop").unwrap();

    c.bench_function("rematerialize_up_to_date_table", |b| {
        b.iter(|| {
            db.ensure_up_to_date("two_hop").unwrap();
            black_box(db.len("two_hop"))
        });
    });
}

criterion_group!(benches, bench_two_hop_join, bench_rematerialize_unchanged);
criterion_main!(benches);
