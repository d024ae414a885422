//! Server-role accept loop.
//!
//! Runs as a task on the transport's background runtime. It sleeps on
//! the command channel until asked to listen, accepts exactly one
//! connection, hands it to [`Shared`], and goes back to waiting.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::state::ConnectionPhase;
use crate::transport::manager::Shared;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Requests from the processing side to the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerCommand {
    /// Drop any prior socket and accept a new client.
    Listen,
    /// Exit the loop.
    Stop,
}

// ── Accept ───────────────────────────────────────────────────────

/// Source of inbound connections.
pub(crate) trait Accept: Send + Sync + 'static {
    type Stream: AsyncWrite + Send + Unpin + 'static;

    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    fn local_port(&self) -> u16;
}

impl Accept for TcpListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = TcpListener::accept(self).await?;
        socket2::SockRef::from(&stream).set_keepalive(true)?;
        Ok((stream, peer))
    }

    fn local_port(&self) -> u16 {
        self.local_addr().map(|a| a.port()).unwrap_or_default()
    }
}

// ── Loop ─────────────────────────────────────────────────────────

pub(crate) async fn run_listener<A: Accept>(
    listener: A,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<ListenerCommand>,
    cancel: CancellationToken,
) {
    let port = listener.local_port();

    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => command,
        };
        match command {
            Some(ListenerCommand::Listen) => {}
            Some(ListenerCommand::Stop) | None => break,
        }

        // A queued request can arrive after a client already attached.
        if shared.is_connected() {
            debug!(port, "listen request while connected; ignoring");
            continue;
        }

        shared.detach().await;
        shared.transition(|phase| {
            phase.force_disconnect();
            phase.begin_connect()
        });
        info!(port, "waiting for connection");

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(port, "accept cancelled");
                    return;
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "client connection received");
                    shared.attach(Box::new(stream), peer).await;
                    break;
                }
                Err(e) => {
                    error!(error = %e, "error accepting TCP session");
                    shared.detach().await;
                    shared.transition(|phase| {
                        *phase = ConnectionPhase::Connecting;
                        Ok(())
                    });
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    debug!(port, "listener stopped");
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::transport::write::testing::ChunkedWriter;

    const WAIT: Duration = Duration::from_secs(5);

    fn peer() -> SocketAddr {
        "127.0.0.1:42000".parse().unwrap()
    }

    fn emfile() -> io::Error {
        io::Error::other("too many open files")
    }

    /// Hands out scripted results, then errors (`fail_forever`) or pends.
    struct ScriptedAccept {
        script: Mutex<VecDeque<io::Result<ChunkedWriter>>>,
        /// Phase observed at each accept call.
        seen: Arc<Mutex<Vec<ConnectionPhase>>>,
        shared: Arc<Shared>,
        fail_forever: bool,
    }

    impl ScriptedAccept {
        fn new(shared: &Arc<Shared>, script: Vec<io::Result<ChunkedWriter>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Arc::default(),
                shared: Arc::clone(shared),
                fail_forever: false,
            }
        }
    }

    impl Accept for ScriptedAccept {
        type Stream = ChunkedWriter;

        async fn accept(&self) -> io::Result<(ChunkedWriter, SocketAddr)> {
            self.seen.lock().unwrap().push(self.shared.phase());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result.map(|w| (w, peer())),
                None if self.fail_forever => Err(emfile()),
                None => std::future::pending().await,
            }
        }

        fn local_port(&self) -> u16 {
            0
        }
    }

    #[tokio::test]
    async fn failed_accept_keeps_listening() {
        let shared = Arc::new(Shared::new());
        let acceptor = ScriptedAccept::new(&shared, vec![Err(emfile()), Ok(ChunkedWriter::new(8))]);
        let seen = Arc::clone(&acceptor.seen);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_listener(acceptor, Arc::clone(&shared), rx, cancel.clone()));
        tx.send(ListenerCommand::Listen).unwrap();

        let mut phase = shared.subscribe();
        tokio::time::timeout(WAIT, phase.wait_for(ConnectionPhase::is_connected))
            .await
            .expect("timeout")
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectionPhase::Connecting, ConnectionPhase::Connecting]
        );
        assert_eq!(shared.phase().peer(), Some(peer()));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn persistent_accept_errors_back_off() {
        let shared = Arc::new(Shared::new());
        let mut acceptor = ScriptedAccept::new(&shared, Vec::new());
        acceptor.fail_forever = true;
        let seen = Arc::clone(&acceptor.seen);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_listener(acceptor, Arc::clone(&shared), rx, cancel.clone()));
        tx.send(ListenerCommand::Listen).unwrap();

        tokio::time::sleep(ACCEPT_RETRY_DELAY * 3 + ACCEPT_RETRY_DELAY / 2).await;
        cancel.cancel();
        tokio::time::timeout(WAIT, task).await.expect("timeout").unwrap();

        let attempts = seen.lock().unwrap().len();
        assert!((2..=5).contains(&attempts), "{attempts} accept attempts");
        assert_eq!(shared.phase(), ConnectionPhase::Connecting);
    }

    #[tokio::test]
    async fn accepted_streams_have_keepalive() {
        // Plain bind: the listener itself has keep-alive off.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();

        let (stream, _) = Accept::accept(&listener).await.unwrap();
        assert!(socket2::SockRef::from(&stream).keepalive().unwrap());
        assert_eq!(listener.local_port(), addr.port());
    }

    #[tokio::test]
    async fn stop_command_ends_idle_loop() {
        let shared = Arc::new(Shared::new());
        let acceptor = ScriptedAccept::new(&shared, Vec::new());
        let seen = Arc::clone(&acceptor.seen);
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_listener(acceptor, shared, rx, CancellationToken::new()));
        tx.send(ListenerCommand::Stop).unwrap();

        tokio::time::timeout(WAIT, task).await.expect("timeout").unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }
}
