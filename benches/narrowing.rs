use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use db2access::candidates::TypeCandidateSet;
use db2access::column_key::ColumnKey;
use db2access::export::{ExportOptions, export_tables};
use db2access::narrow::FieldTypeNarrower;
use db2access::source::CsvSource;
use db2access::xml::XmlRowWriter;
use encoding_rs::UTF_8;
use tempfile::TempDir;

fn generate_orders(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("orders.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "id,amount,ordered_at,ship_time,status").expect("header");
    for i in 0..rows {
        let status = match i % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        };
        let day = (i % 28) + 1;
        let hour = (i % 23) + 1;
        writeln!(
            file,
            "{i},{}.{:02},2024-01-{day:02},{hour:02}:00:00,{status}",
            i % 500,
            i % 100
        )
        .expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_narrowing(c: &mut Criterion) {
    let values = (0..10_000)
        .map(|i| match i % 4 {
            0 => i.to_string(),
            1 => format!("{i}.5"),
            2 => format!("2024-02-{:02}", (i % 28) + 1),
            _ => format!("label-{i}"),
        })
        .collect::<Vec<_>>();
    let catalogue = TypeCandidateSet::standard();

    let mut group = c.benchmark_group("narrowing");

    group.bench_function("observe_mixed_column", |b| {
        b.iter_batched(
            || FieldTypeNarrower::new(catalogue.clone()),
            |mut narrower| {
                let key = ColumnKey::new("t", "c");
                for value in &values {
                    narrower.observe(&key, Some(value.as_str()));
                }
                narrower
            },
            BatchSize::SmallInput,
        );
    });

    let (temp_dir, csv_path) = generate_orders(20_000);
    group.bench_function("export_orders_to_xml", |b| {
        b.iter_batched(
            || CsvSource::open(std::slice::from_ref(&csv_path), None, UTF_8).expect("open source"),
            |mut source| {
                let mut rows = XmlRowWriter::new(std::io::sink(), "orders.xsd").expect("writer");
                let options = ExportOptions {
                    relationships: true,
                    ..ExportOptions::default()
                };
                export_tables(&mut source, &mut rows, &catalogue, &options).expect("export")
            },
            BatchSize::SmallInput,
        );
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_narrowing);
criterion_main!(benches);
