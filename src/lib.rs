//! # feedsub
//!
//! `feedsub` subscribes to one or more feeds on a push-based notification
//! endpoint, unwraps every notification it receives and writes the raw
//! payloads to a file or standard output. The session ends on Ctrl-C, when the
//! session timeout expires or when the endpoint closes the feed; every live
//! subscription is cancelled exactly once on the way out.
//!
//! ## Core Modules
//!
//! - `cli`: command-line flags, the timeout grammar and exit codes.
//! - `config`: endpoint, destination and session settings.
//! - `feeds`: the catalog of known feeds and the selection for this run.
//! - `registry`: per-topic subscription state and traffic counters.
//! - `router`: envelope decoding and the output sink.
//! - `session`: the lifecycle controller and the shutdown coordinator.
//! - `transport`: the endpoint seam and its WebSocket implementation.
//! - `utils`: error types and logging setup.

pub mod cli;
pub mod config;
pub mod feeds;
pub mod registry;
pub mod router;
pub mod session;
pub mod transport;
pub mod utils;
