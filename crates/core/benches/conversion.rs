//! Benchmarks for path planning and conversion.
//!
//! Run with: cargo bench --package fileconverter-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fileconverter_core::{BuiltinProvider, ConversionEngine, ConvertersConfig, EngineBuilder, Parameters, Registry};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn benchmark_planning(c: &mut Criterion) {
    let provider = BuiltinProvider::new().with_soffice_path(Some(PathBuf::from("/nonexistent/soffice")));
    let registry = Registry::discover(&provider, &ConvertersConfig::default());

    let mut group = c.benchmark_group("planning");
    for (input, output) in [("csv", "json"), ("xlsx", "yaml"), ("md", "png")] {
        group.bench_with_input(
            BenchmarkId::new("find_path", format!("{}_to_{}", input, output)),
            &(input, output),
            |b, &(input, output)| b.iter(|| black_box(registry.find_path(input, output, 3))),
        );
    }
    group.finish();
}

fn engine(base: &TempDir) -> ConversionEngine {
    EngineBuilder::new()
        .temp_dir(base.path().to_path_buf())
        .soffice_path(PathBuf::from("/nonexistent/soffice"))
        .build()
        .unwrap()
}

fn benchmark_conversion(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let base = TempDir::new().unwrap();
    let engine = engine(&base);

    let records: Vec<_> = (0..500)
        .map(|i| serde_json::json!({"id": i, "name": format!("item-{}", i), "active": i % 2 == 0}))
        .collect();
    let input = dir.path().join("records.json");
    std::fs::write(&input, serde_json::to_string(&records).unwrap()).unwrap();

    let mut group = c.benchmark_group("conversion");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    for target in ["yaml", "csv", "xml"] {
        let output = dir.path().join(format!("records.{}", target));
        group.bench_function(BenchmarkId::new("json_to", target), |b| {
            b.iter(|| {
                engine
                    .convert(black_box(&input), &output, &Parameters::new())
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_planning, benchmark_conversion);
criterion_main!(benches);
