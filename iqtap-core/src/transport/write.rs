//! Blocking-style write loop with partial-write retry.
//!
//! The loop is generic over [`AsyncWrite`] so the same classification
//! applies to TCP streams and to the in-memory writers used in tests.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// How a write loop ended.
#[derive(Debug)]
pub enum WriteOutcome {
    /// Every requested byte was accepted.
    Complete,
    /// The peer reset the connection or the pipe broke.
    Disconnected(io::Error),
    /// Any other error; the connection is left as is.
    Failed(io::Error),
}

/// Bytes accepted before the loop ended, and why it ended.
#[derive(Debug)]
pub struct WriteReport {
    pub sent: usize,
    pub outcome: WriteOutcome,
}

/// Errors that mean the peer is gone.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}

/// Write `buf`, retrying on partial writes until everything is sent or
/// an error stops the loop.
///
/// There is no timeout: a stalled peer blocks the caller.
pub async fn write_counted<W>(writer: &mut W, buf: &[u8]) -> WriteReport
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    while sent < buf.len() {
        match writer.write(&buf[sent..]).await {
            Ok(0) => {
                return WriteReport {
                    sent,
                    outcome: WriteOutcome::Failed(io::ErrorKind::WriteZero.into()),
                };
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_disconnect(&e) => {
                return WriteReport {
                    sent,
                    outcome: WriteOutcome::Disconnected(e),
                };
            }
            Err(e) => {
                return WriteReport {
                    sent,
                    outcome: WriteOutcome::Failed(e),
                };
            }
        }
    }
    WriteReport {
        sent,
        outcome: WriteOutcome::Complete,
    }
}

// ── Test writers ─────────────────────────────────────────────────
