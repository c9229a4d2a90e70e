use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{
    SessionController, SessionOptions, SessionState, ShutdownCoordinator, ShutdownReason,
    ShutdownSignal,
};
use crate::cli::exit::codes;
use crate::feeds::{FeedFormat, RunningFeeds};
use crate::registry::{SubscriptionHandle, TopicRegistry, TopicState};
use crate::router::OutputSink;
use crate::transport::{FeedTransport, PayloadHandler};
use crate::utils::error::TransportError;

type Feed = mpsc::UnboundedReceiver<(String, Vec<u8>)>;

#[derive(Default)]
struct MockTransport {
    subscribes: Mutex<Vec<String>>,
    unsubscribes: Mutex<Vec<String>>,
    fail_subscribe: HashSet<String>,
    fail_unsubscribe: HashSet<String>,
    feed: Mutex<Option<Feed>>,
}

impl MockTransport {
    fn with_feed(feed: Feed) -> Self {
        Self {
            feed: Mutex::new(Some(feed)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl FeedTransport for MockTransport {
    async fn subscribe(
        &self,
        topic: &str,
        _target: &str,
    ) -> Result<SubscriptionHandle, TransportError> {
        self.subscribes.lock().push(topic.to_string());
        if self.fail_subscribe.contains(topic) {
            return Err(TransportError::Rejected {
                operation: "subscribe",
                topic: topic.to_string(),
                message: "denied".to_string(),
            });
        }
        Ok(SubscriptionHandle::new(format!("sub-{topic}")))
    }

    async fn unsubscribe(
        &self,
        topic: &str,
        handle: &SubscriptionHandle,
    ) -> Result<(), TransportError> {
        assert_eq!(handle.as_str(), format!("sub-{topic}"));
        // give a racing caller a chance to run
        tokio::task::yield_now().await;
        self.unsubscribes.lock().push(topic.to_string());
        if self.fail_unsubscribe.contains(topic) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn run(&self, handler: Arc<dyn PayloadHandler>) -> Result<(), TransportError> {
        let feed = self.feed.lock().take();
        match feed {
            Some(mut rx) => {
                while let Some((topic, envelope)) = rx.recv().await {
                    handler.on_payload(&topic, &envelope)?;
                }
                Ok(())
            }
            None => std::future::pending().await,
        }
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn options(timeout: Option<u64>) -> SessionOptions {
    SessionOptions {
        subscribe_delay: Duration::from_secs(1),
        timeout: timeout.map(Duration::from_secs),
    }
}

fn controller(
    transport: Arc<MockTransport>,
    sink: OutputSink,
    timeout: Option<u64>,
) -> Arc<SessionController> {
    Arc::new(SessionController::new(
        transport,
        Arc::new(sink),
        options(timeout),
    ))
}

fn register_ab(controller: &SessionController) {
    let registry = controller.registry();
    let mut registry = registry.lock();
    registry.register("A", "/feed/a", FeedFormat::RawXml);
    registry.register("B", "/feed/b", FeedFormat::RawXml);
}

#[test]
fn test_signal_first_reason_wins() {
    let signal = ShutdownSignal::new();
    assert!(!signal.is_triggered());
    assert!(signal.trigger(ShutdownReason::Timeout));
    assert!(!signal.trigger(ShutdownReason::Interrupt));
    assert_eq!(signal.reason(), Some(ShutdownReason::Timeout));
}

#[tokio::test]
async fn test_signal_wait_sees_trigger_from_clone() {
    let signal = ShutdownSignal::new();
    let other = signal.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        other.trigger(ShutdownReason::Interrupt);
    });
    assert_eq!(signal.wait().await, ShutdownReason::Interrupt);
    // already fired: resolves immediately
    assert_eq!(signal.wait().await, ShutdownReason::Interrupt);
}

#[tokio::test]
async fn test_racing_shutdowns_unsubscribe_once() {
    let transport = Arc::new(MockTransport::default());
    let mut registry = TopicRegistry::new();
    for name in ["A", "B"] {
        registry.register(name, &format!("/feed/{name}"), FeedFormat::RawJson);
        registry
            .mark_started(name, SubscriptionHandle::new(format!("sub-{name}")))
            .unwrap();
    }
    let registry = registry.shared();
    let coordinator = ShutdownCoordinator::new(
        transport.clone(),
        registry.clone(),
        Arc::new(OutputSink::from_writer("buffer", SharedBuffer::default())),
    );

    let (first, second) = tokio::join!(
        coordinator.shutdown(ShutdownReason::Timeout),
        coordinator.shutdown(ShutdownReason::Interrupt),
    );

    let report = first.expect("first shutdown runs");
    assert!(second.is_none());
    assert_eq!(report.reason, ShutdownReason::Timeout);
    assert_eq!(report.topics.len(), 2);
    assert!(coordinator.has_run());

    let mut unsubscribed = transport.unsubscribes.lock().clone();
    unsubscribed.sort();
    assert_eq!(unsubscribed, vec!["A", "B"]);

    // a third call after completion is also a no-op
    assert!(coordinator.shutdown(ShutdownReason::Interrupt).await.is_none());
    assert_eq!(transport.unsubscribes.lock().len(), 2);
    assert!(registry.lock().started().is_empty());
}

#[tokio::test]
async fn test_shutdown_skips_unstarted_and_tolerates_failures() {
    let transport = Arc::new(MockTransport {
        fail_unsubscribe: HashSet::from(["B".to_string()]),
        ..MockTransport::default()
    });
    let mut registry = TopicRegistry::new();
    registry.register("A", "/feed/a", FeedFormat::RawXml);
    registry.register("B", "/feed/b", FeedFormat::RawXml);
    registry.register("C", "/feed/c", FeedFormat::RawXml);
    registry.mark_started("A", SubscriptionHandle::new("sub-A")).unwrap();
    registry.mark_started("B", SubscriptionHandle::new("sub-B")).unwrap();
    registry.record_traffic("A", 10);
    registry.record_traffic("A", 5);
    let registry = registry.shared();

    let coordinator = ShutdownCoordinator::new(
        transport.clone(),
        registry.clone(),
        Arc::new(OutputSink::from_writer("buffer", SharedBuffer::default())),
    );
    let report = coordinator.shutdown(ShutdownReason::Interrupt).await.unwrap();

    assert_eq!(*transport.unsubscribes.lock(), vec!["A", "B"]);
    assert_eq!(report.topics.len(), 2);
    let a = &report.topics[0];
    assert_eq!((a.name.as_str(), a.bytes, a.packets), ("A", 15, 2));
    assert!(a.unsubscribed);
    assert!(a.uptime_secs.is_some());
    assert!(!report.topics[1].unsubscribed);

    let registry = registry.lock();
    assert_eq!(registry.get("B").unwrap().state, TopicState::Stopped);
    assert_eq!(registry.get("C").unwrap().state, TopicState::Registered);
    assert_eq!(report.exit_code(), codes::SUCCESS);
}

#[tokio::test(start_paused = true)]
async fn test_partial_subscription_is_tolerated() {
    let transport = Arc::new(MockTransport {
        fail_subscribe: HashSet::from(["B".to_string()]),
        ..MockTransport::default()
    });
    let controller = controller(transport.clone(), OutputSink::stdout(), None);
    register_ab(&controller);
    assert_eq!(controller.state(), SessionState::Idle);

    let start = Instant::now();
    let started = controller.subscribe_all().await;
    assert!(start.elapsed() >= Duration::from_secs(1));

    assert_eq!(started, 1);
    assert_eq!(*transport.subscribes.lock(), vec!["A", "B"]);
    assert_eq!(controller.state(), SessionState::Subscribing);
    let registry = controller.registry();
    let registry = registry.lock();
    assert!(registry.get("A").unwrap().started());
    assert_eq!(registry.get("B").unwrap().state, TopicState::Registered);
}

#[tokio::test(start_paused = true)]
async fn test_no_subscriptions_after_shutdown_requested() {
    let transport = Arc::new(MockTransport::default());
    let controller = controller(transport.clone(), OutputSink::stdout(), Some(60));
    register_ab(&controller);

    controller.signal().trigger(ShutdownReason::Interrupt);
    assert_eq!(controller.subscribe_all().await, 0);
    assert!(transport.subscribes.lock().is_empty());
    assert!(controller.arm_timeout().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_grace_period_skips_subscribing() {
    let transport = Arc::new(MockTransport::default());
    let controller = Arc::new(SessionController::new(
        transport.clone(),
        Arc::new(OutputSink::stdout()),
        SessionOptions {
            subscribe_delay: Duration::from_secs(10),
            timeout: Some(Duration::from_secs(3600)),
        },
    ));
    register_ab(&controller);

    let start = Instant::now();
    let running = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.state(), SessionState::Subscribing);
    controller.signal().trigger(ShutdownReason::Interrupt);

    let report = running.await.unwrap();
    assert_eq!(report.reason, ShutdownReason::Interrupt);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(transport.subscribes.lock().is_empty());
    assert!(report.topics.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_ends_session() {
    let transport = Arc::new(MockTransport::default());
    let controller = controller(transport.clone(), OutputSink::stdout(), Some(2));
    register_ab(&controller);

    let start = Instant::now();
    let report = controller.run().await;

    assert_eq!(report.reason, ShutdownReason::Timeout);
    assert_eq!(report.exit_code(), codes::SUCCESS);
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(controller.state(), SessionState::Terminating);

    let mut unsubscribed = transport.unsubscribes.lock().clone();
    unsubscribed.sort();
    assert_eq!(unsubscribed, vec!["A", "B"]);
    let registry = controller.registry();
    let registry = registry.lock();
    assert!(!registry.get("A").unwrap().started());
    assert!(!registry.get("B").unwrap().started());
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_fires_immediately() {
    let transport = Arc::new(MockTransport::default());
    let controller = controller(transport.clone(), OutputSink::stdout(), Some(0));
    register_ab(&controller);

    let start = Instant::now();
    let report = controller.run().await;
    assert_eq!(report.reason, ShutdownReason::Timeout);
    // only the subscribe grace period elapsed
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(report.topics.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_ends_session() {
    let transport = Arc::new(MockTransport::default());
    let controller = controller(transport.clone(), OutputSink::stdout(), Some(3600));
    register_ab(&controller);

    let signal = controller.signal();
    let running = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run().await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(controller.state(), SessionState::Running);
    assert!(signal.trigger(ShutdownReason::Interrupt));

    let report = running.await.unwrap();
    assert_eq!(report.reason, ShutdownReason::Interrupt);
    assert_eq!(transport.unsubscribes.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_end_of_input_routes_payloads_then_stops() {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = Arc::new(MockTransport::with_feed(rx));
    let buffer = SharedBuffer::default();
    let controller = controller(
        transport.clone(),
        OutputSink::from_writer("buffer", buffer.clone()),
        Some(3600),
    );
    controller.register_feeds(&RunningFeeds::select(["AsterixXML"]));

    let running = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run().await })
    };
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(
        controller
            .registry()
            .lock()
            .get("AsterixXML")
            .unwrap()
            .started()
    );

    tx.send((
        "AsterixXML".to_string(),
        b"<Cat62Surveillance>track-1</Cat62Surveillance>".to_vec(),
    ))
    .unwrap();
    tx.send(("AsterixXML".to_string(), b"<garbage".to_vec()))
        .unwrap();
    drop(tx);

    let report = running.await.unwrap();
    assert_eq!(report.reason, ShutdownReason::EndOfInput);
    assert_eq!(buffer.0.lock().as_slice(), b"track-1");
    assert_eq!(report.topics.len(), 1);
    assert_eq!(report.topics[0].bytes, 7);
    assert_eq!(report.topics[0].packets, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_ends_session_with_error_code() {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = Arc::new(MockTransport::with_feed(rx));
    let controller = controller(
        transport.clone(),
        OutputSink::from_writer("pipe", BrokenPipe),
        Some(3600),
    );
    controller.register_feeds(&RunningFeeds::select(["AsterixXML"]));

    let running = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run().await })
    };
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send((
        "AsterixXML".to_string(),
        b"<Cat62Surveillance>x</Cat62Surveillance>".to_vec(),
    ))
    .unwrap();

    let report = running.await.unwrap();
    assert_eq!(report.reason, ShutdownReason::SinkFailure);
    assert_eq!(report.exit_code(), codes::SINK_ERROR);
    assert_eq!(*transport.unsubscribes.lock(), vec!["AsterixXML"]);
}
