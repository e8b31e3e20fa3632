use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use rowflow_bind::{Bson, ColumnBinding, Columns, FieldMap, Row, retrieve};
use rowflow_source::MemorySource;

#[derive(Default)]
struct Contact {
    id: i64,
    name: Option<String>,
    email: Option<String>,
    score: Option<f64>,
    active: bool,
}

rowflow_bind::shape!(Contact {
    id,
    name,
    email,
    score,
    active,
});

const COLUMNS: [&str; 6] = ["ID", "name", "email", "score", "active", "notes"];

fn generate_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            vec![
                Bson::Int64(i as i64),
                Bson::String(format!("Contact {i}")),
                if i % 3 == 0 {
                    Bson::Null
                } else {
                    Bson::String(format!("c{i}@example.com"))
                },
                Bson::Double(i as f64 * 0.5),
                Bson::Boolean(i % 2 == 0),
                Bson::String("x".repeat(64)),
            ]
        })
        .collect()
}

// ── Bind ────────────────────────────────────────────────────

fn bench_bind(c: &mut Criterion) {
    let map = FieldMap::<Contact>::new();
    c.bench_function("bind/6_columns", |b| {
        b.iter(|| ColumnBinding::bind(&map, &COLUMNS))
    });
}

// ── Materialize ─────────────────────────────────────────────

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    let map = FieldMap::<Contact>::new();
    let binding = ColumnBinding::bind(&map, &COLUMNS);
    for n in [100, 1_000] {
        let rows = generate_rows(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || rows.clone(),
                |rows| {
                    for row in rows {
                        binding.materialize(row).unwrap();
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ── Retrieve ────────────────────────────────────────────────

fn bench_retrieve_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrieve/records");
    let map = Arc::new(FieldMap::<Contact>::new());
    for n in [100, 1_000] {
        let rows = generate_rows(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || MemorySource::new(COLUMNS, rows.clone()),
                |mut source| {
                    let buffered = retrieve(&mut source, Columns::All).unwrap();
                    for record in buffered.into_records(Arc::clone(&map)) {
                        record.unwrap();
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bind, bench_materialize, bench_retrieve_records);
criterion_main!(benches);
