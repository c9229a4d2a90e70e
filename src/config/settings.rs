use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes the remote endpoint, the callback destinations and the session
/// tuning knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub endpoint: EndpointSettings,
    pub destinations: DestinationSettings,
    pub session: SessionSettings,
}

/// Where the notification endpoint lives.
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointSettings {
    pub proto: String,
    pub site: String,
    pub port: u16,
    pub path: String,
}

impl EndpointSettings {
    /// Full URL of the endpoint, e.g. `ws://127.0.0.1:8080/wsn`.
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.proto,
            self.site,
            self.port,
            self.path.trim_start_matches('/')
        )
    }
}

/// Named consumer references the endpoint pushes to.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DestinationSettings {
    pub default: Option<String>,
    pub dests: HashMap<String, String>,
}

impl DestinationSettings {
    /// Consumer reference for the default destination, if one is selected.
    pub fn consumer(&self) -> Option<&str> {
        self.default
            .as_deref()
            .and_then(|name| self.dests.get(name))
            .map(String::as_str)
    }
}

/// Session timing.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    /// Grace period between startup and the first subscribe request.
    pub subscribe_delay_ms: u64,
    /// How long to wait for the endpoint to acknowledge a request.
    pub request_timeout_ms: u64,
}

impl SessionSettings {
    pub fn subscribe_delay(&self) -> Duration {
        Duration::from_millis(self.subscribe_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub endpoint: Option<PartialEndpointSettings>,
    pub destinations: Option<PartialDestinationSettings>,
    pub session: Option<PartialSessionSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialEndpointSettings {
    pub proto: Option<String>,
    pub site: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDestinationSettings {
    pub default: Option<String>,
    pub dests: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialSessionSettings {
    pub subscribe_delay_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                proto: "ws".to_string(),
                site: "127.0.0.1".to_string(),
                port: 8080,
                path: "wsn".to_string(),
            },
            destinations: DestinationSettings::default(),
            session: SessionSettings {
                subscribe_delay_ms: 1000,
                request_timeout_ms: 5000,
            },
        }
    }
}
