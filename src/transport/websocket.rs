//! WebSocket transport
//!
//! Client side of the endpoint connection. Responsibilities:
//! - Open the WebSocket and keep a writer task draining an outbound channel
//! - Send subscribe/unsubscribe requests and wait for the matching reply,
//!   correlated by request id and bounded by a timeout
//! - In [`FeedTransport::run`], read frames, resolve pending requests and hand
//!   notifications to the payload handler

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use super::message::{ClientMessage, ServerMessage};
use super::{FeedTransport, PayloadHandler};
use crate::registry::SubscriptionHandle;
use crate::utils::error::TransportError;

type Inbound = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// What the endpoint answered to a request.
#[derive(Debug)]
enum Reply {
    Subscribed(String),
    Unsubscribed,
    Rejected(String),
}

type Pending = Mutex<HashMap<String, oneshot::Sender<Reply>>>;

pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<WsMessage>,
    inbound: Mutex<Option<Inbound>>,
    pending: Pending,
    /// Set once the receive loop has ended; no reply can arrive after that.
    closed: AtomicBool,
    consumer: Option<String>,
    request_timeout: Duration,
}

impl WebSocketTransport {
    /// Connects to `url`. `consumer` is forwarded with every subscribe request
    /// so the endpoint knows which destination to push to.
    pub async fn connect(
        url: &str,
        consumer: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let (ws_stream, _response) =
            connect_async(url)
                .await
                .map_err(|source| TransportError::Connect {
                    url: url.to_string(),
                    source,
                })?;
        debug!("Connected to {url}");

        let (mut ws_sender, ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send frame: {e}");
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("Send loop closed");
        });

        Ok(Self {
            outbound: tx,
            inbound: Mutex::new(Some(ws_receiver)),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            consumer,
            request_timeout,
        })
    }

    async fn request(
        &self,
        operation: &'static str,
        topic: &str,
        request_id: String,
        msg: &ClientMessage,
    ) -> Result<Reply, TransportError> {
        let text =
            serde_json::to_string(msg).map_err(|e| TransportError::Protocol(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);

        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().remove(&request_id);
            warn!("Receive loop has ended, cannot {operation} {topic}");
            return Err(TransportError::Closed);
        }
        if self.outbound.send(WsMessage::text(text)).is_err() {
            self.pending.lock().remove(&request_id);
            return Err(TransportError::Closed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Reply::Rejected(message))) => Err(TransportError::Rejected {
                operation,
                topic: topic.to_string(),
                message,
            }),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(TransportError::Timeout {
                    operation,
                    topic: topic.to_string(),
                    timeout_ms: u64::try_from(self.request_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                })
            }
        }
    }

    fn resolve(&self, request_id: &str, reply: Reply) {
        match self.pending.lock().remove(request_id) {
            Some(waiter) => {
                let _ = waiter.send(reply);
            }
            None => warn!("Reply for unknown request {request_id}: {reply:?}"),
        }
    }
}

#[async_trait]
impl FeedTransport for WebSocketTransport {
    async fn subscribe(
        &self,
        topic: &str,
        target: &str,
    ) -> Result<SubscriptionHandle, TransportError> {
        let request_id = Uuid::new_v4().to_string();
        let msg = ClientMessage::Subscribe {
            request_id: request_id.clone(),
            topic: topic.to_string(),
            target: target.to_string(),
            consumer: self.consumer.clone(),
        };

        match self.request("subscribe", topic, request_id, &msg).await? {
            Reply::Subscribed(subscription) => Ok(SubscriptionHandle::new(subscription)),
            other => Err(TransportError::Protocol(format!(
                "unexpected reply to subscribe: {other:?}"
            ))),
        }
    }

    async fn unsubscribe(
        &self,
        topic: &str,
        handle: &SubscriptionHandle,
    ) -> Result<(), TransportError> {
        let request_id = Uuid::new_v4().to_string();
        let msg = ClientMessage::Unsubscribe {
            request_id: request_id.clone(),
            topic: topic.to_string(),
            subscription: handle.as_str().to_string(),
        };

        match self.request("unsubscribe", topic, request_id, &msg).await? {
            Reply::Unsubscribed => Ok(()),
            other => Err(TransportError::Protocol(format!(
                "unexpected reply to unsubscribe: {other:?}"
            ))),
        }
    }

    async fn run(&self, handler: Arc<dyn PayloadHandler>) -> Result<(), TransportError> {
        let mut inbound = self
            .inbound
            .lock()
            .take()
            .ok_or(TransportError::AlreadyRunning)?;

        let mut outcome = Ok(());
        while let Some(frame) = inbound.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Receive error: {e}");
                    break;
                }
            };
            if msg.is_close() {
                debug!("Endpoint closed the connection");
                break;
            }
            if !msg.is_text() {
                continue;
            }
            let Ok(text) = msg.to_text() else {
                continue;
            };

            match serde_json::from_str::<ServerMessage>(text) {
                Ok(ServerMessage::Notify { topic, envelope }) => {
                    if let Err(e) = handler.on_payload(&topic, envelope.as_bytes()) {
                        outcome = Err(e.into());
                        break;
                    }
                }
                Ok(ServerMessage::Subscribed {
                    request_id,
                    subscription,
                }) => self.resolve(&request_id, Reply::Subscribed(subscription)),
                Ok(ServerMessage::Unsubscribed { request_id }) => {
                    self.resolve(&request_id, Reply::Unsubscribed)
                }
                Ok(ServerMessage::Error {
                    request_id: Some(request_id),
                    message,
                }) => self.resolve(&request_id, Reply::Rejected(message)),
                Ok(ServerMessage::Error {
                    request_id: None,
                    message,
                }) => warn!("Endpoint error: {message}"),
                Err(err) => warn!(
                    "Invalid server message: {err} | {}",
                    text.chars().take(100).collect::<String>()
                ),
            }
        }

        // wake up anyone still waiting for a reply
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().clear();
        outcome
    }
}
