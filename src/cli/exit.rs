//! Exit codes for the feedsub CLI.

use crate::utils::error::StartupError;

/// Exit code constants.
pub mod codes {
    /// Clean shutdown (interrupt, timeout or end of input).
    pub const SUCCESS: i32 = 0;
    /// Startup configuration failure, including a missing feed argument.
    pub const CONFIG_ERROR: i32 = 1;
    /// The output sink could not be created or written.
    pub const SINK_ERROR: i32 = 2;
    /// The endpoint could not be reached at startup.
    pub const TRANSPORT_ERROR: i32 = 3;
}

/// Map a startup failure to an exit code.
pub fn exit_code(error: &StartupError) -> i32 {
    match error {
        StartupError::Config(_) | StartupError::NoFeeds | StartupError::UnknownDestination(_) => {
            codes::CONFIG_ERROR
        }
        StartupError::Sink(_) => codes::SINK_ERROR,
        StartupError::Transport(_) => codes::TRANSPORT_ERROR,
    }
}
