//! CLI command implementations for bcdemux.
//!
//! - [`demux`] - split FASTQ reads into per-barcode files
//! - [`check_barcodes`] - build the mismatch index only and report ambiguous barcodes

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::fn_params_excessive_bools,
    clippy::struct_excessive_bools,
    clippy::uninlined_format_args
)]

pub mod check_barcodes;
pub mod command;
pub mod demux;
