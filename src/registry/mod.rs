//! Topic registry
//!
//! Tracks every topic of the session, its subscription state and its traffic
//! counters. A topic moves `Registered -> Started -> Stopped` and never back;
//! the registry rejects any other transition.
//!
//! Concurrency and usage notes:
//! - The API is synchronous and meant to be held behind a lock
//!   ([`SharedRegistry`]) by the session, the payload router and the shutdown
//!   path. Callers must not hold the lock across an `.await`.

pub mod topic;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;

use crate::feeds::FeedFormat;
use crate::utils::error::RegistryError;

pub use topic::{SubscriptionHandle, Topic, TopicState};

/// Registry handle shared between the session's tasks.
pub type SharedRegistry = Arc<Mutex<TopicRegistry>>;

/// Final counters for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub name: String,
    pub bytes: u64,
    pub packets: u64,
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: HashMap<String, Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    /// Adds a topic in the `Registered` state. An existing entry with the same
    /// name is replaced.
    pub fn register(&mut self, name: &str, target: &str, format: FeedFormat) {
        let previous = self
            .topics
            .insert(name.to_string(), Topic::new(name, target, format));
        if let Some(prev) = previous.filter(Topic::started) {
            warn!(
                "Topic {} re-registered while subscribed to /{}",
                prev.name, prev.target
            );
        }
    }

    /// `Registered -> Started`, storing the transport's handle.
    pub fn mark_started(
        &mut self,
        name: &str,
        handle: SubscriptionHandle,
    ) -> Result<(), RegistryError> {
        let topic = self
            .topics
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownTopic(name.to_string()))?;
        if topic.state != TopicState::Registered {
            return Err(RegistryError::AlreadyStarted(name.to_string()));
        }
        topic.state = TopicState::Started {
            handle,
            since: Utc::now(),
        };
        Ok(())
    }

    /// `Started -> Stopped`, returning the handle that was cleared.
    pub fn mark_stopped(&mut self, name: &str) -> Result<SubscriptionHandle, RegistryError> {
        let topic = self
            .topics
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownTopic(name.to_string()))?;
        match std::mem::replace(&mut topic.state, TopicState::Stopped) {
            TopicState::Started { handle, .. } => Ok(handle),
            other => {
                topic.state = other;
                Err(RegistryError::NotStarted(name.to_string()))
            }
        }
    }

    /// Counts one decoded payload of `len` bytes. Traffic for a topic that is
    /// not started is dropped; returns whether it was counted.
    pub fn record_traffic(&mut self, name: &str, len: usize) -> bool {
        match self.topics.get_mut(name) {
            Some(topic) if topic.started() => {
                topic.bytes_received += len as u64;
                topic.packets_received += 1;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    /// Topics still waiting for a subscription, as `(name, target)`.
    pub fn registered(&self) -> Vec<(String, String)> {
        self.topics
            .values()
            .filter(|t| t.state == TopicState::Registered)
            .map(|t| (t.name.clone(), t.target.clone()))
            .collect()
    }

    /// Live subscriptions, as `(name, handle)`.
    pub fn started(&self) -> Vec<(String, SubscriptionHandle)> {
        self.topics
            .values()
            .filter_map(|t| t.handle().map(|h| (t.name.clone(), h.clone())))
            .collect()
    }

    pub fn stats(&self, name: &str) -> Option<TopicStats> {
        self.topics.get(name).map(|t| TopicStats {
            name: t.name.clone(),
            bytes: t.bytes_received,
            packets: t.packets_received,
        })
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
