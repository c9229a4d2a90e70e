//! Session lifecycle
//!
//! [`SessionController`] subscribes the running feeds after a grace period,
//! arms the session timer and waits on the [`ShutdownSignal`]. Interrupts,
//! the timer and the end of the receive loop all trigger that same signal;
//! the [`ShutdownCoordinator`] then unsubscribes every started topic exactly
//! once and reports the per-topic counters.

pub mod controller;
pub mod shutdown;
pub mod signal;

pub use controller::{SessionController, SessionOptions, SessionState};
pub use shutdown::{ShutdownCoordinator, ShutdownReport, TopicSummary};
pub use signal::{ShutdownReason, ShutdownSignal};

#[cfg(test)]
mod tests;
