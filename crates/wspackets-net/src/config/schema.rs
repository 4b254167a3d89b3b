use std::time::Duration;

use serde::Deserialize;
use wspackets_core::error::{Result, WspError};

use crate::connection::ConnectionOptions;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WspConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub connection: ConnectionSection,
}

impl WspConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WspError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.client.validate()?;
        self.connection.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(WspError::Config("server.path must start with '/'".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_connections")]
    pub connections: usize,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connections: default_connections(),
        }
    }
}

impl ClientSection {
    pub fn validate(&self) -> Result<()> {
        // built without a TLS backend
        if !self.endpoint.starts_with("ws://") {
            return Err(WspError::Config("client.endpoint must be a ws:// url".into()));
        }
        if !(1..=64).contains(&self.connections) {
            return Err(WspError::Config(
                "client.connections must be between 1 and 64".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    #[serde(default = "default_slow_handler_ms")]
    pub slow_handler_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            slow_handler_ms: default_slow_handler_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=600_000).contains(&self.slow_handler_ms) {
            return Err(WspError::Config(
                "connection.slow_handler_ms must be between 1 and 600000".into(),
            ));
        }
        if !(64..=256 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(WspError::Config(
                "connection.max_frame_bytes must be between 64 and 268435456".into(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            slow_handler_threshold: Duration::from_millis(self.slow_handler_ms),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:5022".into()
}
fn default_path() -> String {
    "/ws".into()
}
fn default_endpoint() -> String {
    "ws://localhost:5022/ws".into()
}
fn default_connections() -> usize {
    1
}
fn default_slow_handler_ms() -> u64 {
    3000
}
fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}
