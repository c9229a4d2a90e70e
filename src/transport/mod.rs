//! The `transport` module is the seam to the remote notification endpoint.
//!
//! The session only needs four capabilities from it: subscribe, unsubscribe,
//! a receive loop, and a way to hand every received payload to a consumer.
//! [`FeedTransport`] and [`PayloadHandler`] describe those;
//! [`websocket::WebSocketTransport`] implements them over a WebSocket
//! connection.

pub mod message;
pub mod websocket;

use std::sync::Arc;

use async_trait::async_trait;

use crate::registry::SubscriptionHandle;
use crate::utils::error::{SinkError, TransportError};

/// Consumer of received payloads, registered with the transport's receive loop.
pub trait PayloadHandler: Send + Sync {
    /// Handles the envelope of one notification for `topic`. Only sink
    /// failures are reported back; they end the receive loop.
    fn on_payload(&self, topic: &str, envelope: &[u8]) -> Result<(), SinkError>;
}

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Asks the endpoint to push `target` notifications for `topic`.
    async fn subscribe(
        &self,
        topic: &str,
        target: &str,
    ) -> Result<SubscriptionHandle, TransportError>;

    /// Cancels the subscription created for `topic`.
    async fn unsubscribe(
        &self,
        topic: &str,
        handle: &SubscriptionHandle,
    ) -> Result<(), TransportError>;

    /// Drives delivery until the endpoint closes the connection (`Ok`) or the
    /// handler reports a sink failure.
    async fn run(&self, handler: Arc<dyn PayloadHandler>) -> Result<(), TransportError>;
}
