use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dsff::formats::Sink;
use dsff::{CodecOptions, Dsff, Format, Mode};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Generate a synthetic semicolon-delimited file
fn generate_test_csv(path: &Path, num_rows: usize) {
    let mut content = String::from("id;sepal_length;sepal_width;species;label\n");
    for i in 0..num_rows {
        content.push_str(&format!(
            "{};{:.1};{:.1};{};{}\n",
            i,
            4.0 + (i % 40) as f64 * 0.1,
            2.0 + (i % 20) as f64 * 0.1,
            ["setosa", "versicolor", "virginica"][i % 3],
            i % 2
        ));
    }
    fs::write(path, content).unwrap();
}

fn bench_csv_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_import");

    for num_rows in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(num_rows as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}rows", num_rows)),
            &num_rows,
            |b, &num_rows| {
                b.iter_batched(
                    || {
                        let temp_dir = TempDir::new().unwrap();
                        let input = temp_dir.path().join("input.csv");
                        generate_test_csv(&input, num_rows);
                        (temp_dir, input)
                    },
                    |(temp_dir, input)| {
                        let output = temp_dir.path().join("output.dsff");
                        let mut ds = Dsff::open(&output, Mode::Create).unwrap();
                        ds.from_csv(&input).unwrap();
                        ds.close().unwrap();
                        drop(temp_dir);
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    let num_rows = 5_000;

    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.csv");
    generate_test_csv(&input, num_rows);
    let mut ds = Dsff::in_memory();
    ds.from_csv(&input).unwrap();
    let dataset = ds.container().to_dataset();
    let options = CodecOptions::default();

    group.throughput(Throughput::Elements(num_rows as u64));
    for format in [Format::Arff, Format::Parquet] {
        group.bench_function(format.name(), |b| {
            b.iter(|| {
                format
                    .codec()
                    .dump(&dataset, Sink::Text, &options)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_csv_import, bench_export);
criterion_main!(benches);
