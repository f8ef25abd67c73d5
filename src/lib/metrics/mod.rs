//! Metrics collection and reporting for demultiplexing runs.
//!
//! - [`demux`] - Per-barcode read counts
//! - [`writer`] - Metrics file I/O utilities

pub mod demux;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use demux::SampleBarcodeMetric;
pub use writer::write_metrics;

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type.
    ///
    /// Used in error messages and logging when writing metrics files.
    fn metric_name() -> &'static str;
}
