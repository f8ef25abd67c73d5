//! Integration tests for the bcdemux binary.
//!
//! Each file runs one subcommand end to end against files in a temporary directory.

mod helpers;
mod test_check_barcodes_command;
mod test_demux_command;
