//! Writing metrics to TSV files.

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use log::info;
use std::path::Path;

use super::Metric;

/// Writes `metrics` as a TSV with a header row taken from the field names.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
///
/// # Example
/// ```no_run
/// use bcdemux_lib::metrics::{SampleBarcodeMetric, write_metrics};
///
/// let rows = vec![SampleBarcodeMetric {
///     barcode: "ACGT".to_string(),
///     sample: "s1".to_string(),
///     reads: 10,
///     ..Default::default()
/// }];
/// write_metrics("demux_metrics.txt", &rows).unwrap();
/// ```
pub fn write_metrics<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default().write_tsv(&path_ref, metrics).with_context(|| {
        format!("Failed to write {} metrics: {}", T::metric_name(), path_ref.display())
    })?;
    info!("Wrote {} {} metric rows to {}", metrics.len(), T::metric_name(), path_ref.display());
    Ok(())
}
