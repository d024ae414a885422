//! # Transport
//!
//! A single TCP connection in client or server role.
//!
//! ```text
//!  processing thread                 iqtap-transport thread
//! ┌───────────────────────┐         ┌──────────────────────────┐
//! │ Sink::work            │ Listen  │ run_listener             │
//! │   TransportManager    │ ──────► │   accept() one client    │
//! │     .write()  ◄─ lock ┼─────────┼─► Shared { link, phase } │
//! └───────────────────────┘         └──────────────────────────┘
//! ```
//!
//! | Module     | Purpose                                        |
//! |------------|------------------------------------------------|
//! | `manager`  | Lifecycle, role handling, the write entry point |
//! | `listener` | Server-role accept loop and its command channel |
//! | `write`    | Partial-write retry loop and error classes      |

mod listener;
pub mod manager;
pub mod write;

use std::io;

use serde::{Deserialize, Serialize};

pub use manager::TransportManager;
pub use write::{WriteOutcome, WriteReport, is_disconnect, write_counted};

// ── Role ─────────────────────────────────────────────────────────

/// Which side opens the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Connect out to `host:port` once at start.
    Client,
    /// Listen on `host:port` and accept one client at a time.
    #[default]
    Server,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

// ── TransportConfig ──────────────────────────────────────────────

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub role: Role,
    /// Target host (client) or bind address (server).
    pub host: String,
    pub port: u16,
}

// ── WriteStatus ──────────────────────────────────────────────────

/// What a [`TransportManager::write`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// All bytes were sent.
    Sent(usize),
    /// No connection was attached; nothing was written.
    NotConnected,
    /// Server role: the client went away and the accept loop was re-armed.
    Disconnected { sent: usize },
    /// Client role: the server went away; the caller should stop.
    EndOfStream { sent: usize },
    /// A non-recoverable error ended the loop; the connection is kept.
    Failed { sent: usize, kind: io::ErrorKind },
}

impl WriteStatus {
    /// Bytes accepted by the socket.
    pub fn sent(&self) -> usize {
        match *self {
            Self::Sent(sent)
            | Self::Disconnected { sent }
            | Self::EndOfStream { sent }
            | Self::Failed { sent, .. } => sent,
            Self::NotConnected => 0,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_bytes_by_variant() {
        assert_eq!(WriteStatus::Sent(12).sent(), 12);
        assert_eq!(WriteStatus::Disconnected { sent: 4 }.sent(), 4);
        assert_eq!(
            WriteStatus::Failed {
                sent: 3,
                kind: io::ErrorKind::Other
            }
            .sent(),
            3
        );
        assert_eq!(WriteStatus::NotConnected.sent(), 0);
    }

    #[test]
    fn role_display_and_default() {
        assert_eq!(Role::default(), Role::Server);
        assert_eq!(Role::Client.to_string(), "client");
    }
}
