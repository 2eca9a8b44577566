use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_explorer::data::dimension::DimensionCache;
use data_explorer::data::document::{infer_field_types, Field};
use data_explorer::data::query::{QueryState, SortDirection};
use data_explorer::data::query_engine::QueryEngine;
use serde_json::{json, Value};

fn create_test_data(rows: usize) -> (Vec<Field>, Vec<Value>) {
    let books = [
        "Commodities Trading",
        "Equity Trading",
        "FX Trading",
        "Bond Trading",
        "Derivatives",
        "Options",
        "Futures",
        "ETF Trading",
        "Structured Products",
        "Money Markets",
    ];

    let data: Vec<Value> = (0..rows)
        .map(|i| {
            json!({
                "id": i,
                "book": books[i % books.len()],
                "value": (i * 7919) % 100_003,
                "status": format!("STATUS_{}", i % 5),
            })
        })
        .collect();
    let mut fields = vec![
        Field::new("id"),
        Field::new("book"),
        Field::new("value"),
        Field::new("status"),
    ];
    infer_field_types(&mut fields, &data);
    (fields, data)
}

fn benchmark_sort(c: &mut Criterion) {
    let (fields, rows) = create_test_data(50_000);
    let engine = QueryEngine::new();
    let query = QueryState::new()
        .sort_by("value", SortDirection::Desc)
        .with_size(100);

    let mut group = c.benchmark_group("sort");

    group.bench_function("scan_50k", |b| {
        b.iter(|| engine.execute(black_box(&rows), &fields, &query));
    });

    // Dimension built once, then reused for every page
    group.bench_function("indexed_50k", |b| {
        let mut cache = DimensionCache::new();
        b.iter(|| engine.execute_indexed(black_box(&rows), &fields, &query, &mut cache));
    });

    group.bench_function("multi_key_50k", |b| {
        let query = QueryState::new()
            .sort_by("value", SortDirection::Asc)
            .sort_by("book", SortDirection::Asc);
        b.iter(|| engine.execute(black_box(&rows), &fields, &query));
    });

    group.finish();
}

fn benchmark_facets(c: &mut Criterion) {
    let (fields, rows) = create_test_data(100_000);
    let engine = QueryEngine::new();

    let mut group = c.benchmark_group("facets");

    group.bench_function("two_facets_100k", |b| {
        let query = QueryState::new()
            .facet("books", "book")
            .facet("status", "status")
            .with_size(10);
        b.iter(|| engine.execute(black_box(&rows), &fields, &query));
    });

    group.bench_function("filtered_facet_100k", |b| {
        let query = QueryState::new()
            .filter_term("status", "STATUS_1")
            .facet("books", "book")
            .with_size(10);
        b.iter(|| engine.execute(black_box(&rows), &fields, &query));
    });

    group.finish();
}

criterion_group!(benches, benchmark_sort, benchmark_facets);
criterion_main!(benches);
