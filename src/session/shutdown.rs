use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::signal::ShutdownReason;
use crate::cli::exit::codes;
use crate::registry::SharedRegistry;
use crate::router::OutputSink;
use crate::transport::FeedTransport;

/// Final state of one topic after shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub name: String,
    pub bytes: u64,
    pub packets: u64,
    pub unsubscribed: bool,
    pub uptime_secs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    pub topics: Vec<TopicSummary>,
}

impl ShutdownReport {
    pub fn exit_code(&self) -> i32 {
        match self.reason {
            ShutdownReason::SinkFailure => codes::SINK_ERROR,
            _ => codes::SUCCESS,
        }
    }
}

/// Unsubscribes every started topic and flushes the sink, at most once.
pub struct ShutdownCoordinator {
    transport: Arc<dyn FeedTransport>,
    registry: SharedRegistry,
    sink: Arc<OutputSink>,
    fired: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        registry: SharedRegistry,
        sink: Arc<OutputSink>,
    ) -> Self {
        Self {
            transport,
            registry,
            sink,
            fired: AtomicBool::new(false),
        }
    }

    pub fn has_run(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Runs the shutdown sequence. Only the first call does any work and gets
    /// the report; later calls return `None`.
    pub async fn shutdown(&self, reason: ShutdownReason) -> Option<ShutdownReport> {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress, ignoring {reason}");
            return None;
        }
        info!("Shutting down: {reason}");

        let mut started = self.registry.lock().started();
        started.sort_by(|a, b| a.0.cmp(&b.0));

        let mut topics = Vec::with_capacity(started.len());
        for (name, handle) in started {
            debug!("Unsubscribing from {name}");
            let unsubscribed = match self.transport.unsubscribe(&name, &handle).await {
                Ok(()) => true,
                Err(e) => {
                    error!("Error unsubscribing to {name}: {e}");
                    false
                }
            };

            let summary = {
                let mut registry = self.registry.lock();
                let uptime_secs = registry
                    .get(&name)
                    .and_then(|t| t.uptime(Utc::now()))
                    .map(|d| d.num_seconds());
                if let Err(e) = registry.mark_stopped(&name) {
                    warn!("{e}");
                }
                let stats = registry.stats(&name);
                TopicSummary {
                    name: name.clone(),
                    bytes: stats.as_ref().map_or(0, |s| s.bytes),
                    packets: stats.as_ref().map_or(0, |s| s.packets),
                    unsubscribed,
                    uptime_secs,
                }
            };

            info!(
                "Topic: {} Bytes: {} Pkts: {}",
                summary.name, summary.bytes, summary.packets
            );
            topics.push(summary);
        }

        if let Err(e) = self.sink.flush() {
            error!("{e}");
        }

        Some(ShutdownReport { reason, topics })
    }
}
