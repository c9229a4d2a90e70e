//! Control protocol spoken with the notification endpoint.
//!
//! Frames are JSON text tagged by `type`. Requests carry a `request_id` that
//! the endpoint echoes in its reply; notifications carry the raw envelope of
//! one payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        request_id: String,
        topic: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        consumer: Option<String>,
    },
    Unsubscribe {
        request_id: String,
        topic: String,
        subscription: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed {
        request_id: String,
        subscription: String,
    },
    Unsubscribed {
        request_id: String,
    },
    Error {
        #[serde(default)]
        request_id: Option<String>,
        message: String,
    },
    Notify {
        topic: String,
        envelope: String,
    },
}
