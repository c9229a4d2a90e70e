//! The `utils` module provides shared definitions used across the `feedsub`
//! application: the error types of every component and the logging setup.

pub mod error;
pub mod logging;
