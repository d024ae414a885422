//! # iqtap-sink: sample stream host
//!
//! Command line host for the iqtap stages. Reads a raw complex32 sample
//! stream from a file or stdin and either streams it over TCP through
//! the frame-gated sink, or passes it through the tap to stdout while
//! logging the frames it carries.
//!
//! ## Modes
//!
//! - **Sink** (default): server or client role, per the `[network]` config.
//! - **Tap** (`--tap`): passthrough to stdout with frame telemetry on stderr.

pub mod config;
pub mod input;
pub mod service;
