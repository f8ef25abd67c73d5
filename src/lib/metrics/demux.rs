//! Per-barcode demultiplexing metrics.

use serde::{Deserialize, Serialize};

use super::Metric;

/// Reads assigned to one output bucket.
///
/// One row is written per barcode plus one for the unknown bucket, whose `barcode` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleBarcodeMetric {
    /// The barcode sequence (empty for unmatched reads).
    pub barcode: String,

    /// The barcode identity, or `unknown`.
    pub sample: String,

    /// Read units (single reads or pairs) written to this bucket.
    pub reads: u64,

    /// Reads whose barcode matched with no mismatches.
    pub perfect_matches: u64,

    /// Reads whose barcode matched with one or more mismatches.
    pub mismatched_matches: u64,

    /// Fraction of all well-formed read units assigned to this bucket.
    pub fraction_of_reads: f64,
}

impl Metric for SampleBarcodeMetric {
    fn metric_name() -> &'static str {
        "sample barcode"
    }
}
