//! Payload router
//!
//! Receives every notification from the transport, unwraps the envelope
//! according to the topic's feed format and writes the payload to the output
//! sink. Malformed envelopes are logged and dropped; sink failures are
//! returned so the session can end.

pub mod envelope;
pub mod sink;

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::feeds::FeedFormat;
use crate::registry::{SharedRegistry, TopicState};
use crate::transport::PayloadHandler;
use crate::utils::error::SinkError;

pub use sink::OutputSink;

#[derive(Debug, Clone)]
pub struct PayloadRouter {
    registry: SharedRegistry,
    sink: Arc<OutputSink>,
}

impl PayloadRouter {
    pub fn new(registry: SharedRegistry, sink: Arc<OutputSink>) -> Self {
        Self { registry, sink }
    }

    /// Decodes `envelope` as `format` and writes the payload for `topic`.
    ///
    /// Returns the payload size, or `None` when the envelope was dropped.
    pub fn route(
        &self,
        topic: &str,
        format: FeedFormat,
        envelope: &[u8],
    ) -> Result<Option<usize>, SinkError> {
        let payload = match envelope::decode(format, envelope) {
            Ok(payload) => payload,
            Err(err) => {
                error!(
                    "Error reading payload for {topic}: {}/{err}",
                    String::from_utf8_lossy(envelope)
                );
                return Ok(None);
            }
        };

        debug!("payload size is {}", payload.len());
        self.sink.write_payload(payload)?;
        self.registry.lock().record_traffic(topic, payload.len());
        Ok(Some(payload.len()))
    }
}

impl PayloadHandler for PayloadRouter {
    fn on_payload(&self, topic: &str, envelope: &[u8]) -> Result<(), SinkError> {
        let format = {
            let registry = self.registry.lock();
            match registry.get(topic) {
                Some(t) if t.state != TopicState::Stopped => t.format,
                Some(_) => {
                    debug!("Dropping payload for stopped topic {topic}");
                    return Ok(());
                }
                None => {
                    warn!("Dropping payload for unknown topic {topic}");
                    return Ok(());
                }
            }
        };

        self.route(topic, format, envelope).map(|_| ())
    }
}
