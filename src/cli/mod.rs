//! The `cli` module owns the command-line surface: flag parsing, the timeout
//! grammar and the process exit codes.

mod args;
pub mod duration;
pub mod exit;

pub use args::Cli;
pub use duration::parse_duration;
