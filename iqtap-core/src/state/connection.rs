//! Connection lifecycle owned by the transport manager.
//!
//! Transitions are validated and return `Result` instead of panicking.
//! The sample path only ever looks at [`ConnectionPhase::is_connected`].

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::IqtapError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of the transport's single connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲               │              │
///       │               ▼              ▼
///       └────────── Closing ◄──────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No socket. Initial / terminal state.
    #[default]
    Disconnected,

    /// Client: connect in progress. Server: waiting on accept.
    Connecting,

    /// A peer is attached and writes go to it.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
        /// Remote end of the socket.
        peer: SocketAddr,
    },

    /// Teardown in progress.
    Closing,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { peer, .. } => write!(f, "Connected({peer})"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Remote address while connected.
    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            Self::Connected { peer, .. } => Some(*peer),
            _ => None,
        }
    }

    /// How long the connection has been in the `Connected` state.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since, .. } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), IqtapError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(IqtapError::Other(format!("cannot connect from {self}"))),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self, peer: SocketAddr) -> Result<(), IqtapError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                    peer,
                };
                Ok(())
            }
            _ => Err(IqtapError::Other(format!(
                "cannot complete connection from {self}"
            ))),
        }
    }

    /// Transition to `Closing`.
    ///
    /// Valid from: any state except `Disconnected`.
    pub fn begin_close(&mut self) -> Result<(), IqtapError> {
        match self {
            Self::Disconnected => Err(IqtapError::Other(
                "cannot close: already disconnected".into(),
            )),
            _ => {
                *self = Self::Closing;
                Ok(())
            }
        }
    }

    /// Transition to `Disconnected`.
    ///
    /// Valid from: `Closing`, `Connecting` (accept/connect failure).
    pub fn finish_close(&mut self) -> Result<(), IqtapError> {
        match self {
            Self::Closing | Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(IqtapError::Other(format!("cannot finish close from {self}"))),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Used when a write observes the peer is gone.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = ConnectionPhase::Disconnected;

        phase.begin_connect().unwrap();
        assert_eq!(phase, ConnectionPhase::Connecting);

        phase.complete_connect(peer()).unwrap();
        assert!(phase.is_connected());
        assert_eq!(phase.peer(), Some(peer()));
        assert!(phase.connected_duration().is_some());

        phase.begin_close().unwrap();
        assert_eq!(phase, ConnectionPhase::Closing);

        phase.finish_close().unwrap();
        assert!(phase.is_disconnected());
    }

    #[test]
    fn invalid_transition_connect_when_connected() {
        let mut phase = ConnectionPhase::Connecting;
        phase.complete_connect(peer()).unwrap();
        assert!(phase.begin_connect().is_err());
    }

    #[test]
    fn invalid_complete_from_disconnected() {
        let mut phase = ConnectionPhase::Disconnected;
        assert!(phase.complete_connect(peer()).is_err());
    }

    #[test]
    fn close_from_disconnected_is_rejected() {
        let mut phase = ConnectionPhase::Disconnected;
        assert!(phase.begin_close().is_err());
        assert!(phase.finish_close().is_err());
    }

    #[test]
    fn failed_accept_returns_to_disconnected() {
        let mut phase = ConnectionPhase::Connecting;
        phase.finish_close().unwrap();
        assert!(phase.is_disconnected());
    }

    #[test]
    fn force_disconnect_from_any_state() {
        let mut phase = ConnectionPhase::Connecting;
        phase.complete_connect(peer()).unwrap();
        phase.force_disconnect();
        assert!(phase.is_disconnected());
        assert_eq!(phase.peer(), None);
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionPhase::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionPhase::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionPhase::Closing.to_string(), "Closing");
        assert_eq!(
            ConnectionPhase::Connected {
                since: Instant::now(),
                peer: peer(),
            }
            .to_string(),
            "Connected(127.0.0.1:9000)"
        );
    }

    #[test]
    fn default_phase_is_disconnected() {
        assert!(ConnectionPhase::default().is_disconnected());
    }
}
