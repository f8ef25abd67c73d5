//! Helper utilities for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// A FASTQ record as (name, sequence, quality).
pub type FastqRecord<'a> = (&'a str, &'a str, &'a str);

/// Renders records as FASTQ text.
pub fn fastq_text(records: &[FastqRecord]) -> String {
    records.iter().map(|(name, seq, qual)| format!("@{name}\n{seq}\n+\n{qual}\n")).collect()
}

/// Writes a plain FASTQ file into `dir`.
pub fn write_fastq(dir: &TempDir, name: &str, records: &[FastqRecord]) -> PathBuf {
    write_text(dir, name, &fastq_text(records))
}

/// Writes a gzip-compressed FASTQ file into `dir`.
pub fn write_gzip_fastq(dir: &TempDir, name: &str, records: &[FastqRecord]) -> PathBuf {
    let path = dir.path().join(name);
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(fastq_text(records).as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

/// Writes a FASTA barcode file from (identity, sequence) pairs.
pub fn write_barcodes_fasta(dir: &TempDir, barcodes: &[(&str, &str)]) -> PathBuf {
    let text: String = barcodes.iter().map(|(id, seq)| format!(">{id}\n{seq}\n")).collect();
    write_text(dir, "barcodes.fa", &text)
}

/// Writes arbitrary text into `dir`.
pub fn write_text(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Reads an output file, decompressing it when it ends in `.gz`.
pub fn read_output(path: &Path) -> String {
    let mut content = String::new();
    if path.extension().is_some_and(|e| e == "gz") {
        GzDecoder::new(File::open(path).unwrap()).read_to_string(&mut content).unwrap();
    } else {
        content = fs::read_to_string(path).unwrap();
    }
    content
}

/// The read names in a FASTQ text, in order.
pub fn read_names(fastq: &str) -> Vec<String> {
    fastq.lines().step_by(4).map(|l| l.trim_start_matches('@').to_string()).collect()
}

/// Runs the binary with `args` and captures its output.
pub fn run_bcdemux(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bcdemux")).args(args).output().unwrap()
}

/// Converts a path to `&str` for argument lists.
pub fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}
