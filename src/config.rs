//! Runtime configuration.
//!
//! Defaults can be overridden by a YAML file named in `WRITEGATE_CONFIG`,
//! and the listen address by `LISTEN`.
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//!   body_chunks: 256
//!   chunk_size: 1024
//! channel:
//!   buffer_capacity: 8192
//!   write_timeout_ms: 30000
//! ```

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Number of chunks streamed per response.
    pub body_chunks: usize,
    pub chunk_size: usize,
}

/// Per-response output channel settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum bytes held while the transport is full.
    pub buffer_capacity: usize,
    /// Longest a blocking write may wait for transport capacity. `None`
    /// waits indefinitely.
    pub write_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            body_chunks: 64,
            chunk_size: 1024,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 8192,
            write_timeout_ms: Some(30_000),
        }
    }
}

impl ChannelConfig {
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("Invalid YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.channel.buffer_capacity == 0 {
            anyhow::bail!("channel.buffer_capacity must be greater than zero");
        }
        // A non-blocking write must fit the buffer in one piece.
        if self.server.chunk_size > self.channel.buffer_capacity {
            anyhow::bail!(
                "server.chunk_size ({}) exceeds channel.buffer_capacity ({})",
                self.server.chunk_size,
                self.channel.buffer_capacity
            );
        }
        Ok(())
    }

    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("WRITEGATE_CONFIG") {
            Ok(path) => {
                let yaml = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                Self::from_yaml(&yaml)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var("LISTEN") {
            config.server.listen_addr = addr;
        }

        Ok(config)
    }
}
