//! Benchmark suite for the accessor pipeline
//!
//! Covers the stages a table widget hits on every scroll or sort:
//! - paging a window out of a large table
//! - sorting then paging
//! - filtering
//! - group-by aggregation
//! - chart decimation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use tessera_core::accessor::LttbDecimator;
use tessera_core::{
    AccessorConfig, AccessorRegistry, DataAccessor, DataFormat, DataFrame, DataRequest,
    FunctionRegistry, Series, TabularValue,
};

/// Generate a table with the specified number of rows
fn generate_test_table(num_rows: usize) -> TabularValue {
    let mut ids = Vec::with_capacity(num_rows);
    let mut regions = Vec::with_capacity(num_rows);
    let mut amounts = Vec::with_capacity(num_rows);
    let mut scores = Vec::with_capacity(num_rows);

    let region_options = ["North", "South", "East", "West"];

    for i in 0..num_rows {
        ids.push(i as i64);
        regions.push(region_options[i % 4]);
        amounts.push((i * 7919 % 1000) as i64);
        scores.push(((i as f64) / 50.0).sin());
    }

    let frame = DataFrame::from_series(vec![
        Series::from_ints("id", ids),
        Series::from_strings("region", regions),
        Series::from_ints("amount", amounts),
        Series::from_floats("score", scores),
    ])
    .expect("Failed to create DataFrame");
    TabularValue::Frame(frame)
}

fn request(value: serde_json::Value) -> DataRequest {
    serde_json::from_value(value).expect("valid request")
}

fn run_requests(c: &mut Criterion, group_name: &str, registry: &AccessorRegistry, req: &DataRequest) {
    let mut group = c.benchmark_group(group_name);

    for size in [1_000, 10_000, 100_000].iter() {
        let table = generate_test_table(*size);
        let accessor = registry.accessor_for(&table);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(
                    accessor
                        .get_data("bench", &table, req, DataFormat::Json)
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

/// Benchmark a plain page of 100 rows
fn bench_page(c: &mut Criterion) {
    let registry = AccessorRegistry::new(AccessorConfig::default(), FunctionRegistry::default());
    let req = request(json!({"start": 500, "end": 599}));
    run_requests(c, "page", &registry, &req);
}

/// Benchmark sorting the full table before paging
fn bench_sorted_page(c: &mut Criterion) {
    let registry = AccessorRegistry::new(AccessorConfig::default(), FunctionRegistry::default());
    let req = request(json!({"start": 0, "end": 99, "orderby": "amount", "sort": "desc"}));
    run_requests(c, "sorted_page", &registry, &req);
}

/// Benchmark a case-insensitive contains filter
fn bench_filter(c: &mut Criterion) {
    let registry = AccessorRegistry::new(AccessorConfig::default(), FunctionRegistry::default());
    let req = request(json!({
        "start": 0,
        "end": 99,
        "filters": [{"col": "region", "value": "th", "action": "contains", "matchCase": false}]
    }));
    run_requests(c, "filter", &registry, &req);
}

/// Benchmark group-by aggregation
fn bench_aggregate(c: &mut Criterion) {
    let registry = AccessorRegistry::new(AccessorConfig::default(), FunctionRegistry::default());
    let req = request(json!({
        "aggregates": ["region"],
        "applies": {"amount": "sum", "score": "mean"}
    }));
    run_requests(c, "aggregate", &registry, &req);
}

/// Benchmark LTTB decimation of a chart trace
fn bench_decimate(c: &mut Criterion) {
    let functions = FunctionRegistry::builder()
        .decimator("lttb", LttbDecimator::new(500))
        .build();
    let registry = AccessorRegistry::new(AccessorConfig::default(), functions);
    let req = request(json!({
        "alldata": true,
        "decimatorPayload": {"decimators": [{"decimator": "lttb", "xAxis": "id", "yAxis": "score"}]}
    }));
    run_requests(c, "decimate", &registry, &req);
}

criterion_group!(
    benches,
    bench_page,
    bench_sorted_page,
    bench_filter,
    bench_aggregate,
    bench_decimate,
);

criterion_main!(benches);
