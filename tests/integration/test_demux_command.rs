//! Integration tests for the demux command.

use std::fs;

use tempfile::TempDir;

use crate::helpers::{
    arg, read_names, read_output, run_bcdemux, write_barcodes_fasta, write_fastq,
    write_gzip_fastq, write_text,
};

const BARCODES: &[(&str, &str)] = &[("s1", "AAAA"), ("s2", "CCCC")];

#[test]
fn test_single_end_demux() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let r1 = write_fastq(
        &dir,
        "r1.fq",
        &[
            ("q1", "AAAACTG", "ABCDEFG"),
            ("q2", "CCCATTT", "IIIIIII"),
            ("q3", "GGGGTTT", "IIIIIII"),
            ("q4", "AAAAGGG", "IIIIIII"),
        ],
    );
    let prefix = dir.path().join("out").join("run");

    let output = run_bcdemux(&[
        "demux",
        "--barcodes",
        arg(&barcodes),
        "--r1",
        arg(&r1),
        "--output",
        arg(&prefix),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let s1 = read_output(&dir.path().join("out/run_s1_R1.fastq"));
    assert_eq!(s1, "@q1\nCTG\n+\nEFG\n@q4\nGGG\n+\nIII\n");
    let s2 = read_output(&dir.path().join("out/run_s2_R1.fastq"));
    assert_eq!(s2, "@q2\nTTT\n+\nIII\n");
    let unknown = read_output(&dir.path().join("out/run_unknown_R1.fastq"));
    assert_eq!(unknown, "@q3\nGGGGTTT\n+\nIIIIIII\n");
    assert!(!dir.path().join("out/run_s1_R2.fastq").exists());
}

#[test]
fn test_paired_end_demux_with_metrics() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let r1 = write_fastq(
        &dir,
        "r1.fq",
        &[("q1", "AAAACTG", "ABCDEFG"), ("q2", "GGGGTTT", "IIIIIII"), ("q3", "AATACGT", "IIIIIII")],
    );
    let r2 = write_fastq(
        &dir,
        "r2.fq",
        &[("q1", "TTTTTTT", "HIJKLMN"), ("q2", "ACACACA", "IIIIIII"), ("q3", "GGGG", "IIII")],
    );
    let prefix = dir.path().join("run");
    let metrics = dir.path().join("metrics.txt");

    let output = run_bcdemux(&[
        "demux",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&r1),
        "-r",
        arg(&r2),
        "-o",
        arg(&prefix),
        "--metrics",
        arg(&metrics),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(read_output(&dir.path().join("run_s1_R1.fastq")).lines().nth(1), Some("CTG"));
    let s1_r2 = read_output(&dir.path().join("run_s1_R2.fastq"));
    assert_eq!(read_names(&s1_r2), vec!["q1", "q3"]);
    assert_eq!(s1_r2.lines().nth(1), Some("TTTTTTT"));
    assert_eq!(s1_r2.lines().nth(3), Some("HIJKLMN"));
    assert_eq!(read_names(&read_output(&dir.path().join("run_unknown_R2.fastq"))), vec!["q2"]);

    let metrics = fs::read_to_string(metrics).unwrap();
    let lines: Vec<&str> = metrics.lines().collect();
    assert_eq!(
        lines[0],
        "barcode\tsample\treads\tperfect_matches\tmismatched_matches\tfraction_of_reads"
    );
    assert!(lines[1].starts_with("AAAA\ts1\t2\t1\t1\t"));
    assert!(lines[2].starts_with("\tunknown\t1\t0\t0\t"));
    assert!(lines[3].starts_with("CCCC\ts2\t0\t0\t0\t"));
}

#[test]
fn test_gzip_input_and_output() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let r1 = write_gzip_fastq(&dir, "r1.fq.gz", &[("q1", "CCCCAC", "IIIIII")]);
    let prefix = dir.path().join("run");

    let output = run_bcdemux(&[
        "demux",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&r1),
        "-o",
        arg(&prefix),
        "--compression-level",
        "6",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(read_output(&dir.path().join("run_s2_R1.fastq.gz")), "@q1\nAC\n+\nII\n");
    assert_eq!(read_output(&dir.path().join("run_unknown_R1.fastq.gz")), "");
}

#[test]
fn test_interleaved_input_and_output() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let reads = write_fastq(
        &dir,
        "il.fq",
        &[
            ("q1/1", "AAAAGG", "IIIIII"),
            ("q1/2", "TTTTTT", "IIIIII"),
            ("q2/1", "CCCCGG", "IIIIII"),
            ("q2/2", "ACGTAC", "IIIIII"),
        ],
    );
    let prefix = dir.path().join("run");

    let output = run_bcdemux(&[
        "demux",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&reads),
        "--interleaved-input",
        "--interleaved-output",
        "-o",
        arg(&prefix),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let s1 = read_output(&dir.path().join("run_s1_il.fastq"));
    assert_eq!(s1, "@q1/1\nGG\n+\nII\n@q1/2\nTTTTTT\n+\nIIIIII\n");
    assert_eq!(read_names(&read_output(&dir.path().join("run_s2_il.fastq"))), vec!["q2/1", "q2/2"]);
}

#[test]
fn test_malformed_records_are_skipped() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let r1 = write_text(
        &dir,
        "r1.fq",
        "@q1\nAAAACG\n+\nIIIIII\nq2\nAAAACG\n+\nIIIIII\n@q3\nCCCCGT\n+\nIII\n@q4\nCCCCGT\n+\nIIIIII\n",
    );
    let prefix = dir.path().join("run");

    let output =
        run_bcdemux(&["demux", "-b", arg(&barcodes), "-i", arg(&r1), "-o", arg(&prefix)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(read_names(&read_output(&dir.path().join("run_s1_R1.fastq"))), vec!["q1"]);
    assert_eq!(read_names(&read_output(&dir.path().join("run_s2_R1.fastq"))), vec!["q4"]);
    assert_eq!(read_output(&dir.path().join("run_unknown_R1.fastq")), "");
}

#[test]
fn test_record_missing_a_line_only_loses_itself() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let r1 = write_text(
        &dir,
        "r1.fq",
        "@q1\nAAAACG\nIIIIII\n@q2\nAAAACG\n+\nIIIIII\n@q3\nCCCCGT\n+\nIIIIII\n",
    );
    let prefix = dir.path().join("run");
    let metrics = dir.path().join("metrics.txt");

    let output = run_bcdemux(&[
        "demux",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&r1),
        "-o",
        arg(&prefix),
        "--metrics",
        arg(&metrics),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(read_names(&read_output(&dir.path().join("run_s1_R1.fastq"))), vec!["q2"]);
    assert_eq!(read_names(&read_output(&dir.path().join("run_s2_R1.fastq"))), vec!["q3"]);
    let reads: u64 = fs::read_to_string(&metrics)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split('\t').nth(2).unwrap().parse::<u64>().unwrap())
        .sum();
    assert_eq!(reads, 2);
}

#[test]
fn test_unequal_paired_inputs_fail() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let r1 = write_fastq(&dir, "r1.fq", &[("q1", "AAAA", "IIII"), ("q2", "AAAA", "IIII")]);
    let r2 = write_fastq(&dir, "r2.fq", &[("q1", "TTTT", "IIII")]);
    let prefix = dir.path().join("run");

    let output = run_bcdemux(&[
        "demux",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&r1),
        "-r",
        arg(&r2),
        "-o",
        arg(&prefix),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("different lengths"));
}

#[test]
fn test_empty_barcode_file_fails_before_output() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_text(&dir, "barcodes.fa", "");
    let r1 = write_fastq(&dir, "r1.fq", &[("q1", "AAAA", "IIII")]);
    let prefix = dir.path().join("out").join("run");

    let output =
        run_bcdemux(&["demux", "-b", arg(&barcodes), "-i", arg(&r1), "-o", arg(&prefix)]);
    assert!(!output.status.success());
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_barcodes_fasta(&dir, BARCODES);
    let missing = dir.path().join("missing.fq");
    let prefix = dir.path().join("run");

    let output =
        run_bcdemux(&["demux", "-b", arg(&barcodes), "-i", arg(&missing), "-o", arg(&prefix)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_table_barcodes_with_two_mismatches() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_text(&dir, "barcodes.tsv", "Barcode\tSample\nAAAAAAAA\ts1\nCCCCCCCC\ts2\n");
    let r1 = write_fastq(&dir, "r1.fq", &[("q1", "AATAAGAATT", "IIIIIIIIII")]);
    let prefix = dir.path().join("run");

    let output = run_bcdemux(&[
        "demux",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&r1),
        "-o",
        arg(&prefix),
        "-m",
        "2",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(read_output(&dir.path().join("run_s1_R1.fastq")), "@q1\nTT\n+\nII\n");
}

#[test]
fn test_combinatorial_demux() {
    let dir = TempDir::new().unwrap();
    let barcodes = write_text(&dir, "combos.tsv", "AAAA\tGGGG\tp1\nAAAA\tTTTT\tp2\n");
    let r1 = write_fastq(
        &dir,
        "r1.fq",
        &[("q1", "AAAACC", "IIIIII"), ("q2", "AAATCC", "IIIIII"), ("q3", "CCCCCC", "IIIIII")],
    );
    let r2 = write_fastq(
        &dir,
        "r2.fq",
        &[("q1", "TTTTAC", "ABCDEF"), ("q2", "GGGGAC", "IIIIII"), ("q3", "GGGGAC", "IIIIII")],
    );
    let prefix = dir.path().join("run");
    let metrics = dir.path().join("metrics.txt");

    let output = run_bcdemux(&[
        "demux",
        "--combinatorial",
        "-b",
        arg(&barcodes),
        "-i",
        arg(&r1),
        "-r",
        arg(&r2),
        "-o",
        arg(&prefix),
        "--metrics",
        arg(&metrics),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(read_output(&dir.path().join("run_p2_R1.fastq")), "@q1\nCC\n+\nII\n");
    assert_eq!(read_output(&dir.path().join("run_p2_R2.fastq")), "@q1\nAC\n+\nEF\n");
    assert_eq!(read_names(&read_output(&dir.path().join("run_p1_R1.fastq"))), vec!["q2"]);
    assert_eq!(read_names(&read_output(&dir.path().join("run_unknown_R2.fastq"))), vec!["q3"]);

    let metrics = fs::read_to_string(metrics).unwrap();
    assert!(metrics.lines().any(|line| line.starts_with("AAAA+GGGG\tp1\t1\t0\t1\t")));
}
