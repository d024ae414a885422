//! Configuration for the sink host.

use std::path::Path;

use serde::{Deserialize, Serialize};

use iqtap_core::{Role, SAMPLE_SIZE, SinkConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkHostConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Sample stream shape and flush policy.
    pub stream: StreamConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// "server" listens for one client; "client" connects out.
    pub role: Role,
    /// Bind address (server) or target host (client).
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes per sample. Only complex32 (8) is supported.
    pub item_size: usize,
    /// Samples per item.
    pub vec_len: usize,
    /// Samples handed to each `work` call.
    pub batch_size: usize,
    /// Flush batches that end inside the mean vector.
    pub stream_mean_vector: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            role: Role::Server,
            host: "0.0.0.0".into(),
            port: 9000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            item_size: SAMPLE_SIZE,
            vec_len: 1,
            batch_size: 4096,
            stream_mean_vector: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Missing,
    /// The file exists but did not parse; holds the parse error.
    Invalid(String),
}

impl ConfigSource {
    /// Log how the configuration was obtained. Call once tracing is up.
    pub fn log(&self, path: &Path) {
        match self {
            Self::File => tracing::info!("loaded config from {}", path.display()),
            Self::Missing => tracing::info!("no config at {}; using defaults", path.display()),
            Self::Invalid(e) => {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display())
            }
        }
    }
}

impl SinkHostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Nothing is logged here; the caller reports the returned source
    /// after the subscriber is installed.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return (Self::default(), ConfigSource::Missing);
        };
        match toml::from_str(&contents) {
            Ok(cfg) => (cfg, ConfigSource::File),
            Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
        }
    }

    /// Convert into the core sink's construction parameters.
    pub fn to_sink_config(&self) -> SinkConfig {
        SinkConfig {
            item_size: self.stream.item_size,
            vec_len: self.stream.vec_len,
            host: self.network.host.clone(),
            port: self.network.port,
            role: self.network.role,
            stream_mean_vector: self.stream.stream_mean_vector,
        }
    }

    /// Samples per batch: at least one item, and a whole number of items.
    pub fn batch_samples(&self) -> usize {
        let vec_len = self.stream.vec_len.max(1);
        let batch = self.stream.batch_size.max(vec_len);
        batch - batch % vec_len
    }
}

// ── Tests ────────────────────────────────────────────────────────
