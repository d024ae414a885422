//! Error types for the iqtap stages.
//!
//! Startup and configuration problems are returned as `IqtapError`.
//! Mid-stream socket failures are not errors at this level: the transport
//! classifies them into a [`WriteStatus`](crate::transport::WriteStatus)
//! and the sample path keeps running.

use std::net::SocketAddr;

use thiserror::Error;

/// The canonical error type for iqtap.
#[derive(Debug, Error)]
pub enum IqtapError {
    // ── Startup Errors ───────────────────────────────────────────
    /// The target host/port could not be resolved.
    #[error("unable to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Resolution succeeded but produced no usable address.
    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },

    /// The outbound connection could not be established.
    #[error("connection error to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The listening socket could not be bound.
    #[error("unable to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called on a transport that is already running.
    #[error("transport already started")]
    AlreadyStarted,

    /// The background runtime could not be created.
    #[error("runtime error: {0}")]
    Runtime(String),

    // ── Configuration Errors ─────────────────────────────────────
    /// A construction parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O ──────────────────────────────────────────────────────
    /// The socket/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}
