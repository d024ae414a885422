//! # iqtap-core
//!
//! Frame extraction and TCP streaming for complex baseband sample streams.
//!
//! This crate contains:
//! - **Frame**: `FrameExtractor`, the state machine that recovers metadata
//!   frames (`Frame`, `ChannelEntry`) embedded in a `Complex32` stream
//! - **Tap**: `Tap`, a 1:1 passthrough stage that observes frames
//! - **Sink**: `Sink`, a terminal stage that flushes the stream to TCP when a
//!   frame milestone is reached
//! - **Transport**: `TransportManager`, a client or server TCP endpoint with
//!   reconnect handling and partial-write retry
//! - **State**: `ConnectionPhase`, the connection lifecycle
//! - **Error**: `IqtapError`, a `thiserror`-based error hierarchy

pub mod error;
pub mod frame;
pub mod sink;
pub mod state;
pub mod tap;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::IqtapError;
pub use frame::{
    ChannelEntry, ExtractorState, Frame, FrameExtractor, MEAN_VECTOR_LEN, Milestones,
    PREAMBLE_LEN, SENTINEL, Sample,
};
pub use sink::{SAMPLE_SIZE, Sink, SinkConfig, SinkStats, WorkStatus};
pub use state::ConnectionPhase;
pub use tap::Tap;
pub use transport::{Role, TransportConfig, TransportManager, WriteStatus};
