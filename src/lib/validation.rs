//! Input validation for command-line parameters and paths.
//!
//! Failures are reported as [`DemuxError`] values so callers get the parameter name and the
//! offending value in the message.

use crate::errors::{DemuxError, Result};
use std::fmt::Display;
use std::path::Path;

/// Largest mismatch budget accepted on the command line.
///
/// Variant counts grow as `C(L, k) * 4^k` per barcode, so larger budgets are impractical.
pub const MAX_MISMATCHES: usize = 4;

/// Validates that a file exists.
///
/// # Errors
///
/// Returns an error if the file does not exist.
///
/// # Example
/// ```
/// use bcdemux_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/reads.fastq", "Input FASTQ");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(DemuxError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validates that every `(path, description)` pair names an existing file.
///
/// # Errors
///
/// Returns an error for the first file that does not exist.
pub fn validate_files_exist<P: AsRef<Path>>(files: &[(P, &str)]) -> Result<()> {
    for (path, desc) in files {
        validate_file_exists(path, desc)?;
    }
    Ok(())
}

/// Validates that `value` lies in `min..=max`.
///
/// # Errors
///
/// Returns an error naming `name` when the value is out of range.
///
/// # Example
/// ```
/// use bcdemux_lib::validation::validate_range;
///
/// validate_range(6, 0, 9, "compression-level").unwrap();
/// assert!(validate_range(12, 0, 9, "compression-level").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_range<T: PartialOrd + Display>(value: T, min: T, max: T, name: &str) -> Result<()> {
    if value < min || value > max {
        return Err(DemuxError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be between {min} and {max}, got: {value}"),
        });
    }
    Ok(())
}

/// Validates a gzip compression level, where 0 means uncompressed output.
///
/// # Errors
///
/// Returns an error if the level is above 9.
pub fn validate_compression_level(level: u32) -> Result<()> {
    validate_range(level, 0, 9, "compression-level")
}

/// Validates the mismatch budget against [`MAX_MISMATCHES`].
///
/// # Errors
///
/// Returns an error if the budget is too large.
pub fn validate_max_mismatches(max_mismatches: usize) -> Result<()> {
    validate_range(max_mismatches, 0, MAX_MISMATCHES, "max-mismatches")
}
