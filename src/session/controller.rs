use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::shutdown::{ShutdownCoordinator, ShutdownReport};
use super::signal::{ShutdownReason, ShutdownSignal};
use crate::feeds::RunningFeeds;
use crate::registry::{SharedRegistry, TopicRegistry};
use crate::router::{OutputSink, PayloadRouter};
use crate::transport::{FeedTransport, PayloadHandler};
use crate::utils::error::{SinkError, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Subscribing,
    Armed,
    Running,
    Terminating,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Wait before the first subscribe request.
    pub subscribe_delay: Duration,
    /// Session length; `None` runs until interrupted or the feed ends.
    pub timeout: Option<Duration>,
}

/// Payload handler installed by the session. The first sink failure requests
/// shutdown; the transport keeps reading so unsubscribe replies still arrive,
/// and later payloads are dropped.
struct SessionHandler {
    router: PayloadRouter,
    signal: ShutdownSignal,
    failed: AtomicBool,
}

impl PayloadHandler for SessionHandler {
    fn on_payload(&self, topic: &str, envelope: &[u8]) -> Result<(), SinkError> {
        if self.failed.load(Ordering::SeqCst) {
            debug!("Output failed, dropping payload for {topic}");
            return Ok(());
        }
        if let Err(e) = self.router.on_payload(topic, envelope) {
            error!("{e}");
            self.failed.store(true, Ordering::SeqCst);
            self.signal.trigger(ShutdownReason::SinkFailure);
        }
        Ok(())
    }
}

/// Owns the topic registry and drives subscribe, run and teardown.
pub struct SessionController {
    transport: Arc<dyn FeedTransport>,
    registry: SharedRegistry,
    sink: Arc<OutputSink>,
    signal: ShutdownSignal,
    coordinator: Arc<ShutdownCoordinator>,
    state: Mutex<SessionState>,
    options: SessionOptions,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        sink: Arc<OutputSink>,
        options: SessionOptions,
    ) -> Self {
        let registry = TopicRegistry::new().shared();
        let coordinator = Arc::new(ShutdownCoordinator::new(
            transport.clone(),
            registry.clone(),
            sink.clone(),
        ));
        Self {
            transport,
            registry,
            sink,
            signal: ShutdownSignal::new(),
            coordinator,
            state: Mutex::new(SessionState::Idle),
            options,
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.coordinator.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != SessionState::Terminating && *state != next {
            debug!("Session {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Router writing to this session's sink and counting into its registry.
    pub fn router(&self) -> PayloadRouter {
        PayloadRouter::new(self.registry.clone(), self.sink.clone())
    }

    pub fn register_feeds(&self, feeds: &RunningFeeds) {
        let mut registry = self.registry.lock();
        for feed in feeds.iter() {
            registry.register(feed.name, feed.target, feed.format);
        }
    }

    /// Waits out the grace period, then subscribes every registered topic.
    /// Failures are logged and leave the topic unstarted. Returns how many
    /// topics started.
    ///
    /// A shutdown request during the grace period cuts it short.
    pub async fn subscribe_all(&self) -> usize {
        self.set_state(SessionState::Subscribing);
        tokio::select! {
            _ = tokio::time::sleep(self.options.subscribe_delay) => {}
            reason = self.signal.wait() => {
                debug!("Shutdown requested during startup ({reason})");
            }
        }

        let mut pending = self.registry.lock().registered();
        pending.sort();

        let mut started = 0;
        for (name, target) in pending {
            if self.signal.is_triggered() {
                debug!("Shutdown requested, skipping remaining subscriptions");
                break;
            }

            debug!("Subscribing to /{target} for {name}");
            let handle = match self.transport.subscribe(&name, &target).await {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Error subscribing to {name}: {e}");
                    continue;
                }
            };
            debug!("  unsub is {handle}");

            let marked = self.registry.lock().mark_started(&name, handle);
            match marked {
                Ok(()) => started += 1,
                Err(e) => error!("Cannot start {name}: {e}"),
            }
        }
        started
    }

    /// Starts the one-shot session timer, if a timeout is configured and
    /// shutdown has not already been requested.
    pub fn arm_timeout(&self) -> Option<JoinHandle<()>> {
        let timeout = self.options.timeout?;
        if self.signal.is_triggered() {
            return None;
        }
        if timeout.is_zero() {
            warn!("Session timeout is 0s, stopping immediately");
        } else {
            debug!("Run for {}s", timeout.as_secs());
        }

        self.set_state(SessionState::Armed);
        let signal = self.signal.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if signal.trigger(ShutdownReason::Timeout) {
                info!("Session timeout reached");
            }
        }))
    }

    /// Turns the first Ctrl-C into a shutdown request.
    pub fn listen_for_interrupt(&self) -> JoinHandle<()> {
        let signal = self.signal.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    if signal.trigger(ShutdownReason::Interrupt) {
                        info!("Program killed !");
                    }
                }
                Err(e) => warn!("Cannot listen for interrupts: {e}"),
            }
        })
    }

    fn spawn_receive_loop(&self) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let signal = self.signal.clone();
        let handler: Arc<dyn PayloadHandler> = Arc::new(SessionHandler {
            router: self.router(),
            signal: self.signal.clone(),
            failed: AtomicBool::new(false),
        });

        tokio::spawn(async move {
            let reason = match transport.run(handler).await {
                Ok(()) => {
                    info!("Endpoint closed the feed");
                    ShutdownReason::EndOfInput
                }
                Err(TransportError::Sink(e)) => {
                    error!("{e}");
                    ShutdownReason::SinkFailure
                }
                Err(e) => {
                    error!("Receive loop failed: {e}");
                    ShutdownReason::EndOfInput
                }
            };
            signal.trigger(reason);
        })
    }

    /// Runs the whole session and returns once shutdown has completed.
    ///
    /// The subscribe phase always runs to completion before teardown so that
    /// every subscription the endpoint granted is also cancelled.
    pub async fn run(&self) -> ShutdownReport {
        let receive = self.spawn_receive_loop();
        let interrupt = self.listen_for_interrupt();

        let started = self.subscribe_all().await;
        debug!("{started} topic(s) subscribed");
        let timer = self.arm_timeout();
        self.set_state(SessionState::Running);

        let reason = self.signal.wait().await;
        self.set_state(SessionState::Terminating);

        let report = self
            .coordinator
            .shutdown(reason)
            .await
            .unwrap_or(ShutdownReport {
                reason,
                topics: Vec::new(),
            });

        interrupt.abort();
        receive.abort();
        if let Some(timer) = timer {
            timer.abort();
        }
        report
    }
}
