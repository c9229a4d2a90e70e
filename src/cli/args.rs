use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::duration::parse_duration;

/// Export payloads pushed by a feed endpoint to a file or stdout.
#[derive(Debug, Parser)]
#[command(name = "feedsub", version)]
pub struct Cli {
    /// Output FILE; `-` or omitted writes to stdout
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<String>,

    /// Stop after N s/mn/h/d
    #[arg(short = 'i', value_name = "N(s|mn|h|d)", default_value = "60s")]
    pub timeout: String,

    /// Verbose logging
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Default destination, by name from the configuration
    #[arg(short = 'd', value_name = "DEST")]
    pub dest: Option<String>,

    /// Configuration file
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Feeds to subscribe to
    #[arg(value_name = "FEED")]
    pub feeds: Vec<String>,
}

impl Cli {
    /// Session timeout from `-i`, after the silent-zero parse.
    pub fn session_timeout(&self) -> Duration {
        let secs = parse_duration(&self.timeout);
        Duration::from_secs(u64::try_from(secs).unwrap_or(0))
    }

    /// Output path, with `-` normalised to `None` (stdout).
    pub fn output_path(&self) -> Option<&str> {
        self.output.as_deref().filter(|p| *p != "-")
    }
}
