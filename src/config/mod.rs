mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{DestinationSettings, EndpointSettings, SessionSettings, Settings};

/// Default configuration file, resolved relative to the working directory.
pub const DEFAULT_CONFIG: &str = "config/default";

/// Loads the configuration from `path` (or [`DEFAULT_CONFIG`]) and
/// `FEEDSUB__*` environment variables, then merges it over the defaults.
///
/// A missing file is not an error; a malformed one is.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name(DEFAULT_CONFIG).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix("FEEDSUB").separator("__"))
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(merge(partial))
}

fn merge(partial: PartialSettings) -> Settings {
    let default = Settings::default();

    Settings {
        endpoint: EndpointSettings {
            proto: partial
                .endpoint
                .as_ref()
                .and_then(|e| e.proto.clone())
                .unwrap_or(default.endpoint.proto),
            site: partial
                .endpoint
                .as_ref()
                .and_then(|e| e.site.clone())
                .unwrap_or(default.endpoint.site),
            port: partial
                .endpoint
                .as_ref()
                .and_then(|e| e.port)
                .unwrap_or(default.endpoint.port),
            path: partial
                .endpoint
                .as_ref()
                .and_then(|e| e.path.clone())
                .unwrap_or(default.endpoint.path),
        },
        destinations: DestinationSettings {
            default: partial
                .destinations
                .as_ref()
                .and_then(|d| d.default.clone())
                .or(default.destinations.default),
            dests: partial
                .destinations
                .as_ref()
                .and_then(|d| d.dests.clone())
                .unwrap_or(default.destinations.dests),
        },
        session: SessionSettings {
            subscribe_delay_ms: partial
                .session
                .as_ref()
                .and_then(|s| s.subscribe_delay_ms)
                .unwrap_or(default.session.subscribe_delay_ms),
            request_timeout_ms: partial
                .session
                .as_ref()
                .and_then(|s| s.request_timeout_ms)
                .unwrap_or(default.session.request_timeout_ms),
        },
    }
}
