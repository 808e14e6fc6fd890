//! Performance benchmarks for the per-file upload transform

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sitesync::sync::hasher::hash_file;
use sitesync::sync::TransformPolicy;
use sitesync::LocalFile;
use std::fs;

fn sample_file(dir: &std::path::Path, name: &str, size: usize) -> LocalFile {
    let path = dir.join(name);
    let body: Vec<u8> = b"<div class=\"post\">lorem ipsum dolor sit amet</div>\n"
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect();
    fs::write(&path, &body).unwrap();
    LocalFile {
        path,
        key: name.to_string(),
        size: size as u64,
        is_dir: false,
    }
}

fn bench_prepare(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let policy = TransformPolicy::default();

    let mut group = c.benchmark_group("prepare");
    for size in [256usize, 16 * 1024, 1024 * 1024] {
        let file = sample_file(dir.path(), &format!("page-{}.html", size), size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("html", size), &file, |b, file| {
            b.iter(|| policy.prepare(black_box(file)).unwrap())
        });
    }
    group.finish();
}

fn bench_prepare_and_hash(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let policy = TransformPolicy::default();

    let mut group = c.benchmark_group("prepare_and_hash");
    for size in [16 * 1024usize, 1024 * 1024] {
        let file = sample_file(dir.path(), &format!("app-{}.js", size), size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &file, |b, file| {
            b.iter(|| {
                let prepared = policy.prepare(black_box(file)).unwrap();
                hash_file(prepared.source()).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_hash(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let file = sample_file(dir.path(), "photo.jpg", 4 * 1024 * 1024);

    let mut group = c.benchmark_group("hash");
    group.throughput(Throughput::Bytes(file.size));
    group.bench_function("4mib", |b| b.iter(|| hash_file(black_box(&file.path)).unwrap()));
    group.finish();
}

criterion_group!(benches, bench_prepare, bench_prepare_and_hash, bench_hash);
criterion_main!(benches);
