use std::fmt;

use chrono::{DateTime, Utc};

use crate::feeds::FeedFormat;

/// Opaque token returned by the transport when a subscription is created.
/// It is needed again to cancel that subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(String);

impl SubscriptionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a topic is in its one-way lifecycle.
///
/// The handle lives inside `Started`, so it exists exactly while the topic is
/// started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicState {
    Registered,
    Started {
        handle: SubscriptionHandle,
        since: DateTime<Utc>,
    },
    Stopped,
}

/// A single named subscription to one feed target, with its traffic counters.
#[derive(Debug, Clone)]
pub struct Topic {
    pub name: String,
    pub target: String,
    pub format: FeedFormat,
    pub state: TopicState,
    pub bytes_received: u64,
    pub packets_received: u64,
}

impl Topic {
    /// Creates a registered, not yet started topic with zero counters.
    pub fn new(name: &str, target: &str, format: FeedFormat) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            format,
            state: TopicState::Registered,
            bytes_received: 0,
            packets_received: 0,
        }
    }

    pub fn started(&self) -> bool {
        matches!(self.state, TopicState::Started { .. })
    }

    pub fn handle(&self) -> Option<&SubscriptionHandle> {
        match &self.state {
            TopicState::Started { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Time the subscription has been live, if it is.
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match &self.state {
            TopicState::Started { since, .. } => Some(now - *since),
            _ => None,
        }
    }
}
