//! Custom error types for bcdemux operations.

use thiserror::Error;

/// Result type alias for bcdemux operations
pub type Result<T> = std::result::Result<T, DemuxError>;

/// Error type for bcdemux operations
#[derive(Error, Debug)]
pub enum DemuxError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTQ", "barcode")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// The barcode source contained no barcodes
    #[error("No barcodes found in '{source_name}'")]
    EmptyBarcodeSet {
        /// Where the barcodes were loaded from
        source_name: String,
    },

    /// A barcode's identity or sequence is unusable
    #[error("Invalid barcode '{id}': {reason}")]
    InvalidBarcode {
        /// The barcode identity
        id: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Two barcodes share an identity, so their output files would collide
    #[error("Duplicate barcode identity '{id}' (sequences {first} and {second})")]
    DuplicateBarcodeId {
        /// The shared identity
        id: String,
        /// Sequence of the first barcode with this identity
        first: String,
        /// Sequence of the second barcode with this identity
        second: String,
    },

    /// A single FASTQ record could not be parsed. Recoverable: the record is skipped.
    #[error("Malformed FASTQ record in '{source_name}' at line {line}: {reason}")]
    MalformedRecord {
        /// Name of the input the record came from
        source_name: String,
        /// One-based line number of the record's header line
        line: u64,
        /// Explanation of the problem
        reason: String,
    },

    /// Paired inputs ended at different points
    #[error(
        "Paired inputs have different lengths: {shorter} ended after {records} records while {longer} has more"
    )]
    PairedLengthMismatch {
        /// Name of the input that ran out first
        shorter: String,
        /// Name of the input with records left over
        longer: String,
        /// Number of records consumed from both inputs before the mismatch
        records: u64,
    },

    /// An interleaved input had an unpaired trailing record
    #[error("Interleaved input '{source_name}' has an odd number of records ({records})")]
    UnpairedInterleavedRecord {
        /// Name of the interleaved input
        source_name: String,
        /// Number of records read including the unpaired one
        records: u64,
    },

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DemuxError {
    /// Returns true for errors that affect a single record and should not stop a run.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DemuxError::MalformedRecord { .. })
    }
}
