use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::engine::registry::MAX_OUTBOUND_QUEUE;

/// Top-level server configuration, loaded from chanrelay.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub relay: RelaySection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_address: String,
    /// Allowed CORS origin. `*` allows any origin.
    pub cors_origin: String,
    /// Directory with a browser client to serve as a SPA. Unset disables static serving.
    pub static_dir: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".into(),
            cors_origin: "*".into(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Outbound events buffered per connection before new ones are dropped.
    pub outbound_queue: usize,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            outbound_queue: MAX_OUTBOUND_QUEUE,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::parse(&contents).with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        if let Some(v) = lookup("PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.server.bind_address = with_port(&self.server.bind_address, port);
        }
        if let Some(v) = lookup("CORS_ORIGIN") {
            self.server.cors_origin = v;
        }
        if let Some(v) = lookup("STATIC_DIR") {
            self.server.static_dir = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("OUTBOUND_QUEUE")
            && let Ok(len) = v.parse()
        {
            self.relay.outbound_queue = len;
        }
    }
}

/// Replace the port of a `host:port` address, keeping the host.
fn with_port(address: &str, port: u16) -> String {
    // A `]` after the last colon means a bracketed IPv6 host with no port.
    let host = match address.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => host,
        _ => address,
    };
    format!("{host}:{port}")
}
