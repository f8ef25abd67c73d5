//! The trait behind every `bcdemux` subcommand.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// A subcommand that can be run from the command line.
///
/// `command_line` is the full invocation, logged for provenance.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
