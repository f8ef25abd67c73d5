//! Demultiplex FASTQ reads by the barcode at the start of the forward read.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};

use bcdemux_lib::barcode::{BarcodeFormat, BarcodeSet};
use bcdemux_lib::combinatorial::ComboSet;
use bcdemux_lib::demux::{run_combinatorial, run_source};
use bcdemux_lib::fastq::{FastqReader, ReadSource, open_fastq};
use bcdemux_lib::logging::{OperationTimer, log_demux_summary};
use bcdemux_lib::metrics::write_metrics;
use bcdemux_lib::output::{FileSinkFactory, OutputLayout};
use bcdemux_lib::validation::{
    validate_compression_level, validate_file_exists, validate_files_exist,
    validate_max_mismatches,
};

use crate::commands::command::Command;

type InputSource = ReadSource<FastqReader<Box<dyn BufRead + Send>>>;

/// Splits reads into one set of FASTQ files per barcode.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "demux",
    author,
    version,
    about = "\x1b[38;5;30m[DEMULTIPLEXING]\x1b[0m \x1b[36mSplit FASTQ reads into per-barcode files\x1b[0m",
    long_about = r#"
Assigns each read (or read pair) to the barcode found at the start of the forward read, removes
the barcode from the forward read, and writes the read to that barcode's output files.

## Matching

Up to `--max-mismatches` substitutions are tolerated. An exact match is always preferred over
a match with one mismatch, which is preferred over two, and so on. Barcodes may have different
lengths; the longest barcode that prefixes the read at the lowest mismatch level wins. Bases
other than A, C, G and T never match.

If a sequence is within the mismatch budget of two barcodes, the barcode that appears later in
the barcode file is chosen and a warning is logged. Use `bcdemux check-barcodes` to inspect a
barcode set before running.

Reads matching no barcode are written untrimmed to the `unknown` bucket. The reverse read is
never trimmed.

## Barcode Files

Either FASTA (`>identity` then the sequence) or a tab-separated table of `sequence<TAB>identity`
rows with an optional `Barcode` header line. The format is picked from the file extension unless
`--barcode-format` is given.

## Combinatorial Barcodes

With `--combinatorial` each sample is identified by a barcode at the start of the forward read
together with a barcode at the start of the reverse read. The barcode file is then a
tab-separated table of `forward<TAB>reverse<TAB>identity` rows, paired input is required, and
both barcodes are trimmed from their reads. Pairs whose barcodes do not form a listed
combination go to `unknown`.

## Inputs

- Single-end: `--r1 reads.fq.gz`
- Paired-end: `--r1 r1.fq.gz --r2 r2.fq.gz`; both files must have the same number of records
- Interleaved: `--r1 reads.fq.gz --interleaved-input`

Malformed records are skipped and counted; the run continues.

## Outputs

Files are named `<output>_<identity>_R1.fastq` (and `_R2` for paired input), with `.gz` added
when `--compression-level` is above zero. `--interleaved-output` writes both reads of a pair to
a single `<output>_<identity>_il.fastq` file. Every file, including `unknown`, is created before
the first read is processed.
"#
)]
pub struct Demux {
    /// Barcode file (FASTA or tab-separated table).
    #[arg(short = 'b', long)]
    pub barcodes: PathBuf,

    /// Forward-read FASTQ, optionally gzipped. Holds both reads with --interleaved-input.
    #[arg(short = 'i', long = "r1")]
    pub r1: PathBuf,

    /// Reverse-read FASTQ for paired-end input.
    #[arg(short = 'r', long = "r2")]
    pub r2: Option<PathBuf>,

    /// The --r1 file alternates forward and reverse reads.
    #[arg(long)]
    pub interleaved_input: bool,

    /// Output path prefix; its directory is created if needed.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Maximum number of substitutions between a read prefix and a barcode.
    #[arg(short = 'm', long, default_value = "1")]
    pub max_mismatches: usize,

    /// Write both reads of a pair to a single interleaved file per barcode.
    #[arg(long)]
    pub interleaved_output: bool,

    /// Gzip compression level for outputs (0 writes uncompressed FASTQ).
    #[arg(short = 'z', long, default_value = "0")]
    pub compression_level: u32,

    /// Optional output file for per-barcode metrics.
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    /// Barcode file format.
    #[arg(long, value_enum, default_value_t = BarcodeFormat::Auto)]
    pub barcode_format: BarcodeFormat,

    /// Match a barcode on each read of a pair against a forward/reverse combination table.
    #[arg(short = 'c', long)]
    pub combinatorial: bool,
}

impl Command for Demux {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.validate()?;
        debug!("Command line: {command_line}");

        let timer = OperationTimer::new("Demultiplexing reads");

        let source = self.open_inputs()?;
        let layout = self.output_layout();
        info!("Reading {:?} input, writing {:?} output", source.layout(), layout);
        let factory = FileSinkFactory::new(&self.output, self.compression_level);

        let summary = if self.combinatorial {
            let combos = ComboSet::from_path(&self.barcodes)?;
            self.warn_if_short(combos.shortest());
            run_combinatorial(combos, self.max_mismatches, source, layout, &factory)?
        } else {
            let barcodes = BarcodeSet::from_path(&self.barcodes, self.barcode_format)?;
            self.warn_if_short(barcodes.length_range().0);
            run_source(barcodes, self.max_mismatches, source, layout, &factory)?
        };
        log_demux_summary(&summary);

        if let Some(path) = &self.metrics {
            write_metrics(path, &summary.to_metrics())?;
        }

        timer.log_completion(summary.total_records);
        Ok(())
    }
}

impl Demux {
    /// Checks arguments before anything is read or written.
    fn validate(&self) -> Result<()> {
        validate_file_exists(&self.barcodes, "Barcode file")?;
        validate_file_exists(&self.r1, "R1 FASTQ")?;
        if let Some(r2) = &self.r2 {
            validate_files_exist(&[(r2, "R2 FASTQ")])?;
            if self.interleaved_input {
                bail!("--r2 cannot be used with --interleaved-input");
            }
        }
        if self.interleaved_output && !self.is_paired() {
            bail!("--interleaved-output requires paired input (--r2 or --interleaved-input)");
        }
        if self.combinatorial {
            if !self.is_paired() {
                bail!("--combinatorial requires paired input (--r2 or --interleaved-input)");
            }
            if self.barcode_format == BarcodeFormat::Fasta {
                bail!("--combinatorial needs a forward<TAB>reverse<TAB>identity barcode table");
            }
        }
        validate_max_mismatches(self.max_mismatches)?;
        validate_compression_level(self.compression_level)?;
        Ok(())
    }

    fn warn_if_short(&self, shortest: usize) {
        if self.max_mismatches >= shortest {
            warn!(
                "--max-mismatches ({}) is not less than the shortest barcode ({shortest} bases); \
                 any read can match that barcode",
                self.max_mismatches
            );
        }
    }

    fn is_paired(&self) -> bool {
        self.r2.is_some() || self.interleaved_input
    }

    fn output_layout(&self) -> OutputLayout {
        match (self.is_paired(), self.interleaved_output) {
            (false, _) => OutputLayout::Single,
            (true, false) => OutputLayout::Paired,
            (true, true) => OutputLayout::Interleaved,
        }
    }

    fn open_inputs(&self) -> Result<InputSource> {
        let r1 = open_fastq(&self.r1)?;
        let r1_name = self.r1.display().to_string();
        Ok(match &self.r2 {
            Some(path) => {
                let r2 = open_fastq(path)?;
                ReadSource::paired(r1, r2).with_names(r1_name, path.display().to_string())
            }
            None if self.interleaved_input => {
                ReadSource::interleaved(r1).with_names(r1_name, String::new())
            }
            None => ReadSource::single(r1).with_names(r1_name, String::new()),
        })
    }
}
