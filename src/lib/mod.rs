#![deny(unsafe_code)]
// Clippy lint configuration for CI
// - cast_*: counts and fractions move between integer and float types
// - missing_*_doc: errors are documented where they are not obvious
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

//! # bcdemux - barcode demultiplexing library
//!
//! Assigns sequencing reads to samples by the barcode at the start of the forward read,
//! tolerating a bounded number of substitutions, trims the barcode, and writes each read (or
//! read pair) to a per-sample output bucket. Reads that match no barcode go to an `unknown`
//! bucket.
//!
//! ## Overview
//!
//! ### Matching
//!
//! - **[`mutate`]** - all sequences at exactly `k` substitutions from a barcode
//! - **[`trie`]** - 4-ary prefix trie over the DNA alphabet
//! - **[`index`]** - one trie per mismatch level, with ambiguity detection
//! - **[`matcher`]** - level-ordered, longest-key lookup of read prefixes
//! - **[`combinatorial`]** - forward and reverse barcode combinations matched on read pairs
//!
//! ### Pipeline
//!
//! - **[`barcode`]** - loading and validating barcode sets (FASTA or table)
//! - **[`fastq`]** - FASTQ reading with per-record recovery, paired read sources
//! - **[`output`]** - output buckets and sink factories
//! - **[`demux`]** - the run state machine and the [`demux::run`] entry point
//! - **[`metrics`]** - per-barcode metrics and TSV writing
//!
//! ### Utilities
//!
//! - **[`dna`]**, **[`errors`]**, **[`logging`]**, **[`progress`]**, **[`validation`]**
//!
//! ## Quick Start
//!
//! ```
//! use bcdemux_lib::barcode::{Barcode, BarcodeSet};
//! use bcdemux_lib::matcher::Matcher;
//!
//! # fn main() -> anyhow::Result<()> {
//! let barcodes = BarcodeSet::new(
//!     vec![Barcode::new("id1", "AAAA"), Barcode::new("id2", "CCCC")],
//!     "example",
//! )?;
//! let matcher = Matcher::new(barcodes, 1)?;
//!
//! let (barcode, length) = matcher.assign(b"AAATGGC");
//! assert_eq!(barcode.map(|b| b.id.as_str()), Some("id1"));
//! assert_eq!(length, 4);
//!
//! assert!(matcher.assign(b"GGGGTTT").0.is_none());
//! # Ok(())
//! # }
//! ```

pub mod barcode;
pub mod combinatorial;
pub mod demux;
pub mod dna;
pub mod errors;
pub mod fastq;
pub mod index;
pub mod logging;
pub mod matcher;
pub mod metrics;
pub mod mutate;
pub mod output;
pub mod progress;
pub mod trie;
pub mod validation;

pub use demux::{DemuxSummary, run};
pub use errors::DemuxError;
