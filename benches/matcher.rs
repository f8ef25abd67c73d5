//! Benchmarks for variant generation, index construction and read matching.
//!
//! Run with: `cargo bench`
//! View reports in: `target/criterion/report/index.html`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use bcdemux_lib::barcode::{Barcode, BarcodeSet};
use bcdemux_lib::index::MismatchIndex;
use bcdemux_lib::matcher::Matcher;
use bcdemux_lib::mutate::generate_variants;

/// 96 distinct 8-base barcodes: the index in base 4 followed by a fixed tail.
fn barcode_set() -> BarcodeSet {
    let bases = [b'A', b'C', b'G', b'T'];
    let barcodes = (0..96usize)
        .map(|i| {
            let mut seq: Vec<u8> = (0..4).map(|p| bases[(i >> (2 * p)) % 4]).collect();
            seq.extend_from_slice(b"GATC");
            Barcode::new(format!("s{i}"), seq)
        })
        .collect();
    BarcodeSet::new(barcodes, "bench").expect("valid barcodes")
}

/// Reads that hit at 0 and 1 mismatches, and reads that miss.
fn reads(set: &BarcodeSet) -> Vec<Vec<u8>> {
    let mut reads = Vec::new();
    for barcode in set.iter().take(32) {
        let mut exact = barcode.sequence.clone();
        exact.extend_from_slice(b"ACGTACGTACGTACGT");
        let mut one_off = exact.clone();
        one_off[3] = if one_off[3] == b'A' { b'C' } else { b'A' };
        reads.push(exact);
        reads.push(one_off);
    }
    reads.push(b"NNNNNNNNACGTACGT".to_vec());
    reads
}

fn bench_generate_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_variants");
    for k in 0..=3 {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| black_box(generate_variants(black_box(b"ACGTACGTAC"), k)));
        });
    }
    group.finish();
}

fn bench_index_build(c: &mut Criterion) {
    let set = barcode_set();
    let mut group = c.benchmark_group("index_build");
    for k in 0..=2 {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| black_box(MismatchIndex::build(&set, k).expect("index")));
        });
    }
    group.finish();
}

fn bench_match(c: &mut Criterion) {
    let set = barcode_set();
    let reads = reads(&set);
    let matcher = Matcher::new(set, 1).expect("matcher");
    let mut group = c.benchmark_group("match");
    group.throughput(Throughput::Elements(reads.len() as u64));
    group.bench_function("k1_mixed", |b| {
        b.iter(|| {
            for read in &reads {
                black_box(matcher.find(black_box(read)));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_generate_variants, bench_index_build, bench_match);
criterion_main!(benches);
