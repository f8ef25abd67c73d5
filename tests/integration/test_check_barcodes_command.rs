//! Integration tests for the check-barcodes command.

use tempfile::TempDir;

use crate::helpers::{arg, run_bcdemux, write_barcodes_fasta, write_text};

#[test]
fn test_distant_barcodes_pass() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, &[("s1", "AAAAAA"), ("s2", "CCCCCC")]);

    let output = run_bcdemux(&["check-barcodes", "-b", arg(&barcodes), "-m", "2", "--strict"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No ambiguous barcode variants"));
}

#[test]
fn test_close_barcodes_are_reported() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, &[("s1", "ACGTAC"), ("s2", "ACGTTT")]);

    let output = run_bcdemux(&["check-barcodes", "-b", arg(&barcodes)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("s1 <-> s2"));

    let output = run_bcdemux(&["check-barcodes", "-b", arg(&barcodes), "--strict"]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_barcode_fails() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_text(&dir, "barcodes.tsv", "ACGN\ts1\n");

    let output = run_bcdemux(&["check-barcodes", "-b", arg(&barcodes)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("s1"));
}

#[test]
fn test_duplicate_identity_fails() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, &[("s1", "AAAA"), ("s1", "CCCC")]);

    let output = run_bcdemux(&["check-barcodes", "-b", arg(&barcodes)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Duplicate"));
}
