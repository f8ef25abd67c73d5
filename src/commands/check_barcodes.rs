//! Report ambiguous barcodes without reading any FASTQ.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};

use bcdemux_lib::barcode::{BarcodeFormat, BarcodeSet};
use bcdemux_lib::combinatorial::{ComboMatcher, ComboSet};
use bcdemux_lib::dna::hamming_distance;
use bcdemux_lib::logging::{OperationTimer, format_count};
use bcdemux_lib::matcher::Matcher;
use bcdemux_lib::mutate::variant_count;
use bcdemux_lib::validation::{validate_file_exists, validate_max_mismatches};

use crate::commands::command::Command;

/// Builds the mismatch index for a barcode set and reports collisions.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "check-barcodes",
    author,
    version,
    about = "\x1b[38;5;30m[DEMULTIPLEXING]\x1b[0m \x1b[36mCheck a barcode set for ambiguous variants\x1b[0m",
    long_about = r#"
Builds the same mismatch index `bcdemux demux` would build and reports:

1. The number of barcodes and their length range
2. The number of variants stored at each mismatch level
3. The smallest Hamming distance between barcodes of equal length
4. Every pair of barcodes whose variants collide, with the number of colliding sequences

Two barcodes of the same length collide at some level up to `--max-mismatches` whenever their
Hamming distance is at most twice the budget. Colliding variants are assigned to the barcode that
appears later in the file.

With `--combinatorial` the file is a `forward<TAB>reverse<TAB>identity` table and the forward
and reverse barcodes are checked as two separate sets, as `bcdemux demux --combinatorial` indexes
them.

With `--strict` the command fails when any collision exists, so it can gate a pipeline.
"#
)]
pub struct CheckBarcodes {
    /// Barcode file (FASTA or tab-separated table).
    #[arg(short = 'b', long)]
    pub barcodes: PathBuf,

    /// Maximum number of substitutions between a read prefix and a barcode.
    #[arg(short = 'm', long, default_value = "1")]
    pub max_mismatches: usize,

    /// Barcode file format.
    #[arg(long, value_enum, default_value_t = BarcodeFormat::Auto)]
    pub barcode_format: BarcodeFormat,

    /// Exit with an error if any barcode variants collide.
    #[arg(long)]
    pub strict: bool,

    /// Check a forward<TAB>reverse<TAB>identity combination table, one index per side.
    #[arg(short = 'c', long)]
    pub combinatorial: bool,
}

impl Command for CheckBarcodes {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.barcodes, "Barcode file")?;
        validate_max_mismatches(self.max_mismatches)?;
        if self.combinatorial && self.barcode_format == BarcodeFormat::Fasta {
            bail!("--combinatorial needs a forward<TAB>reverse<TAB>identity barcode table");
        }
        debug!("Command line: {command_line}");

        let timer = OperationTimer::new("Checking barcodes");
        let (entries, conflicts) = if self.combinatorial {
            let combos = ComboSet::from_path(&self.barcodes)?;
            let matcher = ComboMatcher::new(combos, self.max_mismatches)?;
            let conflicts = self.report("Forward", matcher.forward())
                + self.report("Reverse", matcher.reverse());
            (matcher.combos().len(), conflicts)
        } else {
            let barcodes = BarcodeSet::from_path(&self.barcodes, self.barcode_format)?;
            let matcher = Matcher::new(barcodes, self.max_mismatches)?;
            (matcher.barcodes().len(), self.report("Barcode", &matcher))
        };
        timer.log_completion(entries as u64);

        if self.strict && conflicts > 0 {
            bail!(
                "{conflicts} barcode variant(s) are ambiguous with --max-mismatches {}",
                self.max_mismatches
            );
        }
        Ok(())
    }
}

impl CheckBarcodes {
    /// Logs lengths, distances, level sizes and conflicts for one index; returns the number of
    /// conflicting variants.
    fn report(&self, label: &str, matcher: &Matcher) -> usize {
        let barcodes = matcher.barcodes();
        let (shortest, longest) = barcodes.length_range();
        info!("{label}: {} barcodes of length {shortest}-{longest}", barcodes.len());

        if let Some((a, b, d)) = closest_pair(barcodes) {
            info!("{label}: closest barcodes {a} and {b} at Hamming distance {d}");
            if d <= 2 * self.max_mismatches {
                warn!(
                    "{label}: barcodes within {} mismatches of each other can share variants",
                    2 * self.max_mismatches
                );
            }
        }

        for level in matcher.index().levels() {
            let possible: u64 =
                barcodes.iter().map(|b| variant_count(b.len(), level.mismatches())).sum();
            info!(
                "{label} level {}: {} distinct variants ({} enumerated)",
                level.mismatches(),
                format_count(level.len() as u64),
                format_count(possible)
            );
        }

        let conflicts = matcher.index().conflict_summary();
        if conflicts.is_empty() {
            info!("{label}: no ambiguous barcode variants");
        } else {
            for (level, existing, incoming, n) in &conflicts {
                info!(
                    "{label} conflict at {level} mismatch(es): \
                     {existing} <-> {incoming} ({n} variants)"
                );
            }
        }
        matcher.index().conflicts().len()
    }
}

/// The pair of equal-length barcodes with the smallest Hamming distance, first in file order.
fn closest_pair(barcodes: &BarcodeSet) -> Option<(String, String, usize)> {
    let all: Vec<_> = barcodes.iter().collect();
    let mut best: Option<(String, String, usize)> = None;
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if a.len() != b.len() {
                continue;
            }
            let d = hamming_distance(&a.sequence, &b.sequence);
            if best.as_ref().is_none_or(|(_, _, min)| d < *min) {
                best = Some((a.id.clone(), b.id.clone(), d));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcdemux_lib::barcode::Barcode;
    use std::fs;
    use tempfile::TempDir;

    fn command(dir: &TempDir, table: &str, max_mismatches: usize, strict: bool) -> CheckBarcodes {
        let barcodes = dir.path().join("barcodes.tsv");
        fs::write(&barcodes, table).unwrap();
        CheckBarcodes {
            barcodes,
            max_mismatches,
            barcode_format: BarcodeFormat::Auto,
            strict,
            combinatorial: false,
        }
    }

    #[test]
    fn test_closest_pair() {
        let set = BarcodeSet::new(
            vec![
                Barcode::new("a", "AAAAAA"),
                Barcode::new("b", "CCCCCC"),
                Barcode::new("c", "AAAACC"),
                Barcode::new("d", "AAA"),
            ],
            "t",
        )
        .unwrap();
        assert_eq!(closest_pair(&set), Some(("a".to_string(), "c".to_string(), 2)));

        let single = BarcodeSet::new(vec![Barcode::new("a", "AAAA")], "t").unwrap();
        assert_eq!(closest_pair(&single), None);
    }

    #[test]
    fn test_distant_barcodes_pass_strict() {
        let dir = TempDir::new().unwrap();
        let cmd = command(&dir, "Barcode\tSample\nAAAAAA\ts1\nCCCCCC\ts2\n", 1, true);
        cmd.execute("bcdemux check-barcodes").unwrap();
    }

    #[test]
    fn test_close_barcodes_fail_strict_only() {
        let dir = TempDir::new().unwrap();
        let table = "AAAAAA\ts1\nAAAACC\ts2\n";
        command(&dir, table, 1, false).execute("bcdemux check-barcodes").unwrap();
        let err = command(&dir, table, 1, true).execute("bcdemux check-barcodes").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_combinatorial_sides_are_checked_separately() {
        let dir = TempDir::new().unwrap();
        // The forward barcodes are far apart; the reverse ones are one mismatch apart.
        let table = "AAAAAA\tGGGGGG\tp1\nCCCCCC\tGGGGGA\tp2\n";
        let mut cmd = command(&dir, table, 1, true);
        cmd.combinatorial = true;
        let err = cmd.execute("bcdemux check-barcodes -c").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));

        let mut cmd = command(&dir, table, 0, true);
        cmd.combinatorial = true;
        cmd.execute("bcdemux check-barcodes -c").unwrap();
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut cmd = command(&dir, "", 1, false);
        cmd.barcodes = dir.path().join("missing.tsv");
        assert!(cmd.execute("bcdemux check-barcodes").is_err());
    }
}
