use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dmlkit::{Args, Cond, QueryBuilder, RenderMode, qb};

/// SELECT col0, col1, ... FROM t WHERE col0 = ? AND col1 = ? ...
fn build_select<'a>(n: usize) -> qb::Select<'a> {
    let mut select = qb::select_from("t").columns((0..n).map(|i| format!("col{i}")));
    for i in 0..n {
        select = select.where_(Cond::eq(format!("col{i}"), i as i64));
    }
    select
}

/// INSERT INTO t (c0, ..) VALUES (..),(..) with `rows` rows of `width` values.
fn build_insert<'a>(rows: usize, width: usize) -> qb::Insert<'a> {
    let mut insert = qb::insert_into("t").add_columns((0..width).map(|i| format!("c{i}")));
    for r in 0..rows {
        let mut args = Args::with_capacity(width);
        for c in 0..width {
            args.push((r * width + c) as i64);
        }
        insert = insert.add_values(args);
    }
    insert
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/select");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("placeholder", n), &n, |b, &n| {
            let mut select = build_select(n);
            b.iter(|| black_box(select.to_sql_mode(RenderMode::Placeholder)));
        });
        group.bench_with_input(BenchmarkId::new("interpolate", n), &n, |b, &n| {
            let mut select = build_select(n);
            b.iter(|| black_box(select.to_sql_mode(RenderMode::Interpolate)));
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/insert");

    for rows in [1, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
            let mut insert = build_insert(rows, 5);
            b.iter(|| black_box(insert.to_sql()));
        });
    }

    group.finish();
}

fn bench_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/in_list");

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let mut select = qb::select_from("t").in_list("id", values.clone());
                black_box(select.to_sql())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select, bench_insert, bench_in_list);
criterion_main!(benches);
