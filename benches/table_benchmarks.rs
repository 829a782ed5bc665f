use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ted::table::Table;
use ted::value::{DataType, TedValue, Tuple};

fn bench_insert_plain(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert_plain");
    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut table = Table::new("bench", vec![DataType::Int, DataType::Int], false);
                for i in 0..size {
                    table
                        .add(Tuple::new(vec![TedValue::Int(i as i64), TedValue::Int((i * 2) as i64)]))
                        .unwrap();
                }
                black_box(table.len())
            });
        });
    }
    group.finish();
}

fn bench_insert_with_key_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert_keyed");
    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut table = Table::new("bench", vec![DataType::Int, DataType::Int], false);
                table.add_key_index(0, 1000);
                for i in 0..size {
                    table
                        .add(Tuple::new(vec![TedValue::Int(i as i64), TedValue::Int((i * 2) as i64)]))
                        .unwrap();
                }
                black_box(table.len())
            });
        });
    }
    group.finish();
}

fn bench_general_index_probe(c: &mut Criterion) {
    let mut table = Table::new("bench", vec![DataType::Int, DataType::Int], false);
    table.add_general_index(0, 100);
    for i in 0..10_000 {
        table
            .add(Tuple::new(vec![TedValue::Int(i % 50), TedValue::Int(i)]))
            .unwrap();
    }
    let index = table.index_for_column(0).unwrap();

    c.bench_function("general_index_probe", |b| {
        b.iter(|| {
            let ted::index::Index::General(general) = index else {
                unreachable!()
            };
            let count = general.probe(table.rows(), &TedValue::Int(25)).count();
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_insert_plain, bench_insert_with_key_index, bench_general_index_probe);
criterion_main!(benches);
