use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sqlchain::{
    CommandBuilder, DataSource, DesiredColumns, Dialect, ObjectName, Postgres, SqlServer,
    TableOrViewMetadata, Value,
};
use std::collections::BTreeMap;

/// Register `t` with a key column and `n` data columns.
fn source<D: Dialect>(dialect: D, n: usize) -> DataSource<D> {
    let mut columns = vec![dialect.column("id").identity().primary_key()];
    columns.extend((0..n).map(|i| dialect.column(&format!("col{i}"))));
    let ds = DataSource::new(dialect);
    if let Ok(name) = ObjectName::parse("t") {
        ds.metadata().register_table(TableOrViewMetadata::new(name, true, columns));
    }
    ds
}

/// `{id: 1, col0: 0, col1: 1, ...}`
fn argument(n: usize) -> BTreeMap<String, Value> {
    let mut map: BTreeMap<String, Value> = (0..n)
        .map(|i| (format!("col{i}"), Value::I64(i as i64)))
        .collect();
    map.insert("id".to_string(), Value::I32(1));
    map
}

fn bench_update<D: Dialect>(c: &mut Criterion, label: &str, dialect: D) {
    let mut group = c.benchmark_group(format!("sql_builder/update/{label}"));

    for n in [1, 5, 10, 50] {
        let ds = source(dialect.clone(), n);
        let args = argument(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &args, |b, args| {
            b.iter(|| {
                let command = ds.update("t", args).map(|u| u.prepare(&DesiredColumns::AllColumns));
                black_box(command.is_ok());
            });
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/select");

    for n in [1, 5, 10, 50] {
        let ds = source(Postgres, n);
        let filter = argument(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filter, |b, filter| {
            b.iter(|| {
                let command = ds.from("t").map(|f| {
                    f.with_filter(filter)
                        .with_sorting(["id DESC"])
                        .take(10)
                        .prepare_non_query()
                });
                black_box(command.is_ok());
            });
        });
    }

    group.finish();
}

fn bench_updates(c: &mut Criterion) {
    bench_update(c, "sqlserver", SqlServer);
    bench_update(c, "postgres", Postgres);
    bench_update(c, "access", sqlchain::Access);
}

criterion_group!(benches, bench_select, bench_updates);
criterion_main!(benches);
