//! The demultiplexing pipeline.
//!
//! A run moves through four states, each a separate type so a step cannot be skipped:
//!
//! 1. [`Idle`]: a barcode set (or a set of forward and reverse barcode combinations) and a
//!    mismatch budget.
//! 2. [`IndicesBuilt`]: the mismatch levels have been built and conflicts logged.
//! 3. [`Streaming`]: every output bucket is open; read units are matched, trimmed and routed.
//! 4. Finalized: sinks are closed and a [`DemuxSummary`] is returned.
//!
//! [`run`], [`run_source`] and [`run_combinatorial`] drive all four states for callers that do
//! not need the steps.

use std::cmp::Reverse;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::barcode::{Barcode, BarcodeSet, UNKNOWN_ID};
use crate::combinatorial::{BarcodeCombo, ComboMatcher, ComboSet};
use crate::errors::DemuxError;
use crate::fastq::{FastqRecord, InputLayout, ReadPair, ReadSource};
use crate::logging::{format_count, fraction};
use crate::matcher::Matcher;
use crate::metrics::SampleBarcodeMetric;
use crate::output::{BucketManager, OutputLayout, SinkFactory};
use crate::progress::ProgressTracker;

/// Read units between progress log lines.
const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Final count for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCount {
    /// Barcode identity, or `unknown`
    pub id: String,
    /// Barcode sequence; `None` for the unknown bucket
    pub barcode: Option<String>,
    /// Read units routed to the bucket
    pub reads: u64,
    /// Read units whose barcode matched without mismatches
    pub perfect_matches: u64,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxSummary {
    /// One entry per bucket, by descending read count with ties ordered by identity
    pub buckets: Vec<BucketCount>,
    /// Read units consumed, including malformed ones
    pub total_records: u64,
    /// Malformed read units that were skipped
    pub format_errors: u64,
    /// Ambiguous variants found while building the index
    pub conflicts: usize,
}

impl DemuxSummary {
    /// Read units routed to a barcode bucket.
    #[must_use]
    pub fn matched(&self) -> u64 {
        self.buckets.iter().filter(|b| b.barcode.is_some()).map(|b| b.reads).sum()
    }

    /// Read units routed to the unknown bucket.
    #[must_use]
    pub fn unknown(&self) -> u64 {
        self.buckets.iter().filter(|b| b.barcode.is_none()).map(|b| b.reads).sum()
    }

    /// Read units written to any bucket.
    #[must_use]
    pub fn assigned(&self) -> u64 {
        self.matched() + self.unknown()
    }

    /// The count for bucket `id`.
    #[must_use]
    pub fn count_for(&self, id: &str) -> Option<&BucketCount> {
        self.buckets.iter().find(|b| b.id == id)
    }

    /// One metric row per bucket, in summary order.
    #[must_use]
    pub fn to_metrics(&self) -> Vec<SampleBarcodeMetric> {
        let assigned = self.assigned();
        self.buckets
            .iter()
            .map(|b| SampleBarcodeMetric {
                barcode: b.barcode.clone().unwrap_or_default(),
                sample: b.id.clone(),
                reads: b.reads,
                perfect_matches: b.perfect_matches,
                mismatched_matches: if b.barcode.is_some() {
                    b.reads - b.perfect_matches
                } else {
                    0
                },
                fraction_of_reads: fraction(b.reads, assigned),
            })
            .collect()
    }
}

/// Barcodes a run matches against.
#[derive(Debug)]
enum Barcodes {
    /// One barcode at the start of the forward read
    Forward(BarcodeSet),
    /// A forward and a reverse barcode, one at the start of each read of a pair
    Combinatorial(ComboSet),
}

/// The built indices of a run.
#[derive(Debug)]
enum Assigner {
    Forward(Matcher),
    Combinatorial(ComboMatcher),
}

impl Assigner {
    /// Bucket identities in bucket order, not including the unknown bucket.
    fn bucket_ids(&self) -> Vec<&str> {
        match self {
            Assigner::Forward(m) => m.barcodes().iter().map(|b| b.id.as_str()).collect(),
            Assigner::Combinatorial(m) => m.combos().iter().map(|c| c.id.as_str()).collect(),
        }
    }

    /// Barcode sequence text of a bucket; `None` for the unknown bucket.
    fn sequence_of(&self, bucket: usize) -> Option<String> {
        match self {
            Assigner::Forward(m) => m.barcodes().get(bucket).map(Barcode::sequence_str),
            Assigner::Combinatorial(m) => m.combos().get(bucket).map(BarcodeCombo::sequence_str),
        }
    }

    fn conflicts(&self) -> usize {
        match self {
            Assigner::Forward(m) => m.index().conflicts().len(),
            Assigner::Combinatorial(m) => m.conflicts(),
        }
    }

    /// Matches a unit and trims the matched barcodes, returning the bucket and whether the
    /// match was perfect.
    fn assign(&self, pair: &mut ReadPair) -> Option<(usize, bool)> {
        match self {
            Assigner::Forward(m) => {
                let hit = m.find(&pair.r1.seq)?;
                pair.r1.trim_prefix(hit.length);
                Some((hit.barcode, hit.mismatches == 0))
            }
            Assigner::Combinatorial(m) => {
                let r2 = pair.r2.as_mut()?;
                let hit = m.find(&pair.r1.seq, &r2.seq)?;
                pair.r1.trim_prefix(hit.forward.length);
                r2.trim_prefix(hit.reverse.length);
                Some((hit.combo, hit.is_perfect()))
            }
        }
    }
}

/// A run that has not built its index yet.
#[derive(Debug)]
pub struct Idle {
    barcodes: Barcodes,
    max_mismatches: usize,
}

impl Idle {
    /// Starts a run over `barcodes` allowing up to `max_mismatches` substitutions.
    #[must_use]
    pub fn new(barcodes: BarcodeSet, max_mismatches: usize) -> Self {
        Self { barcodes: Barcodes::Forward(barcodes), max_mismatches }
    }

    /// Starts a run that matches a barcode on each read of a pair against `combos`.
    #[must_use]
    pub fn combinatorial(combos: ComboSet, max_mismatches: usize) -> Self {
        Self { barcodes: Barcodes::Combinatorial(combos), max_mismatches }
    }

    /// Builds the mismatch levels `0..=max_mismatches`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be built.
    pub fn build_indices(self) -> Result<IndicesBuilt> {
        let assigner = match self.barcodes {
            Barcodes::Forward(barcodes) => {
                info!(
                    "Building mismatch index for {} barcodes with up to {} mismatches",
                    barcodes.len(),
                    self.max_mismatches
                );
                let matcher = Matcher::new(barcodes, self.max_mismatches)
                    .context("Failed to build the barcode index")?;
                log_levels("Barcode", &matcher);
                Assigner::Forward(matcher)
            }
            Barcodes::Combinatorial(combos) => {
                info!(
                    "Building mismatch indices for {} combinations with up to {} mismatches",
                    combos.len(),
                    self.max_mismatches
                );
                let matcher = ComboMatcher::new(combos, self.max_mismatches)
                    .context("Failed to build the barcode indices")?;
                log_levels("Forward barcode", matcher.forward());
                log_levels("Reverse barcode", matcher.reverse());
                Assigner::Combinatorial(matcher)
            }
        };
        Ok(IndicesBuilt { assigner })
    }
}

fn log_levels(label: &str, matcher: &Matcher) {
    for level in matcher.index().levels() {
        debug!("{label} level {}: {} keys", level.mismatches(), format_count(level.len() as u64));
    }
}

/// A run with a built index and no open outputs.
#[derive(Debug)]
pub struct IndicesBuilt {
    assigner: Assigner,
}

impl IndicesBuilt {
    /// Ambiguous variants found while building the indices.
    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.assigner.conflicts()
    }

    /// Opens every bucket and begins streaming.
    ///
    /// # Errors
    ///
    /// Returns an error if the output layout cannot hold the input layout, combinatorial
    /// barcodes are given single-end input, or any sink cannot be created.
    pub fn start<F: SinkFactory + ?Sized>(
        self,
        input: InputLayout,
        output: OutputLayout,
        factory: &F,
    ) -> Result<Streaming> {
        let paired_output = output != OutputLayout::Single;
        if input.is_paired() != paired_output {
            bail!("{input:?} input cannot be written with {output:?} output");
        }
        if matches!(self.assigner, Assigner::Combinatorial(_)) && !input.is_paired() {
            bail!("Combinatorial barcodes need paired input");
        }
        let buckets = BucketManager::provision(&self.assigner.bucket_ids(), output, factory)?;
        let n = buckets.buckets().len();
        let progress =
            ProgressTracker::new("Processed read units").with_interval(PROGRESS_INTERVAL);
        Ok(Streaming {
            assigner: self.assigner,
            buckets,
            perfect: vec![0; n],
            total_records: 0,
            format_errors: 0,
            progress,
        })
    }
}

/// A run that is routing reads to open buckets.
pub struct Streaming {
    assigner: Assigner,
    buckets: BucketManager,
    perfect: Vec<u64>,
    total_records: u64,
    format_errors: u64,
    progress: ProgressTracker,
}

impl Streaming {
    /// Handles one item from a [`ReadSource`].
    ///
    /// Malformed units are counted and skipped. Any other error ends the run.
    ///
    /// # Errors
    ///
    /// Returns fatal input errors and output write failures.
    pub fn process(&mut self, item: std::result::Result<ReadPair, DemuxError>) -> Result<()> {
        match item {
            Ok(pair) => self.route(pair)?,
            Err(e) if e.is_recoverable() => {
                debug!("Skipping record: {e}");
                self.total_records += 1;
                self.format_errors += 1;
            }
            Err(e) => return Err(e.into()),
        }
        self.progress.record(1);
        Ok(())
    }

    /// Matches the unit, trims the matched barcode(s), and writes it.
    ///
    /// Only the forward read is trimmed, except with combinatorial barcodes where each read
    /// loses its own barcode.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn route(&mut self, mut pair: ReadPair) -> Result<()> {
        self.total_records += 1;
        let hit = self.assigner.assign(&mut pair);
        if let Some((bucket, true)) = hit {
            self.perfect[bucket] += 1;
        }
        self.buckets.write(hit.map(|(bucket, _)| bucket), &pair)
    }

    /// Read units consumed so far.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Closes every sink and reports the counts.
    ///
    /// # Errors
    ///
    /// Returns an error if a sink cannot be flushed or closed.
    pub fn finalize(self) -> Result<DemuxSummary> {
        self.progress.log_final();
        let mut counts: Vec<BucketCount> = self
            .buckets
            .buckets()
            .iter()
            .enumerate()
            .map(|(i, bucket)| BucketCount {
                id: bucket.id().to_string(),
                barcode: self.assigner.sequence_of(i),
                reads: bucket.written(),
                perfect_matches: self.perfect[i],
            })
            .collect();
        counts.sort_by(|a, b| (Reverse(a.reads), &a.id).cmp(&(Reverse(b.reads), &b.id)));

        self.buckets.finish()?;
        Ok(DemuxSummary {
            buckets: counts,
            total_records: self.total_records,
            format_errors: self.format_errors,
            conflicts: self.assigner.conflicts(),
        })
    }
}

/// Demultiplexes one stream of forward reads, plus an optional stream of their mates.
///
/// Paired streams must have the same number of records. Paired input gets an `R1` and an `R2`
/// sink per bucket, single-end input an `R1` sink only.
///
/// # Errors
///
/// Returns an error if the index or any sink cannot be built, the paired streams differ in
/// length, or a write fails.
pub fn run<I, F>(
    barcodes: BarcodeSet,
    max_mismatches: usize,
    reads1: I,
    reads2: Option<I>,
    factory: &F,
) -> Result<DemuxSummary>
where
    I: Iterator<Item = std::result::Result<FastqRecord, DemuxError>>,
    F: SinkFactory + ?Sized,
{
    let (source, output) = match reads2 {
        Some(reads2) => (ReadSource::paired(reads1, reads2), OutputLayout::Paired),
        None => (ReadSource::single(reads1), OutputLayout::Single),
    };
    run_source(barcodes, max_mismatches, source, output, factory)
}

/// Demultiplexes a [`ReadSource`] into buckets with the given output layout.
///
/// # Errors
///
/// See [`run`].
pub fn run_source<I, F>(
    barcodes: BarcodeSet,
    max_mismatches: usize,
    source: ReadSource<I>,
    output: OutputLayout,
    factory: &F,
) -> Result<DemuxSummary>
where
    I: Iterator<Item = std::result::Result<FastqRecord, DemuxError>>,
    F: SinkFactory + ?Sized,
{
    drive(Idle::new(barcodes, max_mismatches), source, output, factory)
}

/// Demultiplexes paired reads by a barcode at the start of each read.
///
/// Both barcodes are trimmed from their reads. Pairs whose barcodes do not form one of `combos`
/// go to the unknown bucket untrimmed.
///
/// # Errors
///
/// See [`run`]; also fails for single-end input.
pub fn run_combinatorial<I, F>(
    combos: ComboSet,
    max_mismatches: usize,
    source: ReadSource<I>,
    output: OutputLayout,
    factory: &F,
) -> Result<DemuxSummary>
where
    I: Iterator<Item = std::result::Result<FastqRecord, DemuxError>>,
    F: SinkFactory + ?Sized,
{
    drive(Idle::combinatorial(combos, max_mismatches), source, output, factory)
}

fn drive<I, F>(
    idle: Idle,
    source: ReadSource<I>,
    output: OutputLayout,
    factory: &F,
) -> Result<DemuxSummary>
where
    I: Iterator<Item = std::result::Result<FastqRecord, DemuxError>>,
    F: SinkFactory + ?Sized,
{
    let mut streaming = idle.build_indices()?.start(source.layout(), output, factory)?;
    for item in source {
        streaming.process(item)?;
    }
    let summary = streaming.finalize()?;
    info!(
        "Assigned {} of {} read units to barcodes ({} to {UNKNOWN_ID}, {} malformed)",
        format_count(summary.matched()),
        format_count(summary.total_records),
        format_count(summary.unknown()),
        format_count(summary.format_errors)
    );
    Ok(summary)
}
