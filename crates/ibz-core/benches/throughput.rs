use std::fs;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ibz_core::format::{compress_chunk, decompress_chunk};
use ibz_core::{Chunk, ParallelCompressor, PipelineConfig};

fn sample_data(len: usize) -> Vec<u8> {
    (0..len)
        .map(|index| match index % 7 {
            0 => (index / 7) as u8,
            _ => b"throughput"[index % 10],
        })
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let chunk = Chunk::new(0, sample_data(8192)).expect("bench chunk");
    let compressed = compress_chunk(&chunk, 6).expect("bench compress");

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(chunk.len() as u64));
    group.bench_function("compress_8k", |b| {
        b.iter(|| compress_chunk(std::hint::black_box(&chunk), 6))
    });
    group.bench_function("decompress_8k", |b| {
        b.iter(|| decompress_chunk(std::hint::black_box(&compressed)))
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("bench tempdir");
    let input = dir.path().join("input.bin");
    let container = dir.path().join("input.ibz");
    let restored = dir.path().join("restored.bin");
    let data = sample_data(16 * 1024 * 1024);
    fs::write(&input, &data).expect("bench input");

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for workers in [1usize, num_cpus::get()] {
        let compressor = ParallelCompressor::new(PipelineConfig::default().with_workers(workers));
        group.bench_function(format!("compress_16mb_w{workers}"), |b| {
            b.iter(|| compressor.compress(&input, &container))
        });
        group.bench_function(format!("round_trip_16mb_w{workers}"), |b| {
            b.iter(|| {
                compressor.compress(&input, &container);
                compressor.decompress(&container, &restored)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_pipeline);
criterion_main!(benches);
