//! The `error` module defines the error types used within the `feedsub` application.
//!
//! Each component owns one enum. Transport and envelope errors are recoverable
//! and stop at the component that produced them; sink errors end the session;
//! startup errors map to a process exit code in `cli::exit`.

use std::io;

use thiserror::Error;

/// Failures talking to the remote notification endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("connection to the endpoint is closed")]
    Closed,

    #[error("no reply to {operation} for topic {topic} within {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        topic: String,
        timeout_ms: u64,
    },

    #[error("endpoint rejected {operation} for topic {topic}: {message}")]
    Rejected {
        operation: &'static str,
        topic: String,
        message: String,
    },

    #[error("malformed control frame: {0}")]
    Protocol(String),

    #[error("receive loop already running")]
    AlreadyRunning,

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Invalid lifecycle transitions on the topic registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("topic {0} is not registered")]
    UnknownTopic(String),

    #[error("topic {0} was already started")]
    AlreadyStarted(String),

    #[error("topic {0} is not started")]
    NotStarted(String),
}

/// Failures unwrapping a notification envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("expected element <{expected}> but found <{found}>")]
    UnexpectedRoot { expected: &'static str, found: String },

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("envelope has no root element")]
    Empty,
}

/// Failures on the output sink. All of them are fatal to the session.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("error creating {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("error writing {len} bytes to {sink}: {source}")]
    Write {
        sink: String,
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("error flushing {sink}: {source}")]
    Flush {
        sink: String,
        #[source]
        source: io::Error,
    },
}

/// Failures before the session starts running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("error loading configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("you must specify at least one feed")]
    NoFeeds,

    #[error("unknown destination {0}")]
    UnknownDestination(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
