//! Owns the TCP connection for a sink stage.
//!
//! The manager is driven from a synchronous processing thread. It keeps
//! a private Tokio runtime with one worker thread; in server role the
//! accept loop runs there, and every write from the processing thread is
//! driven to completion with `block_on`.
//!
//! Do not call into a manager from inside another Tokio runtime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::IqtapError;
use crate::state::ConnectionPhase;
use crate::transport::listener::{ListenerCommand, run_listener};
use crate::transport::write::{WriteOutcome, write_counted};
use crate::transport::{Role, TransportConfig, WriteStatus};

/// The active connection, type-erased so tests can substitute writers.
pub(crate) type Link = Box<dyn AsyncWrite + Send + Unpin>;

// ── Shared ───────────────────────────────────────────────────────

/// State touched by both the processing thread and the accept loop.
pub(crate) struct Shared {
    /// Held for the duration of every write.
    link: Mutex<Option<Link>>,
    phase: watch::Sender<ConnectionPhase>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            link: Mutex::new(None),
            phase: watch::Sender::new(ConnectionPhase::Disconnected),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.phase.borrow().is_connected()
    }

    pub(crate) fn phase(&self) -> ConnectionPhase {
        self.phase.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.subscribe()
    }

    /// Apply a phase transition, logging rejected ones.
    pub(crate) fn transition(
        &self,
        f: impl FnOnce(&mut ConnectionPhase) -> Result<(), IqtapError>,
    ) {
        self.phase.send_modify(|phase| {
            if let Err(e) = f(phase) {
                debug!(error = %e, "phase transition rejected");
            }
        });
    }

    /// Install a new connection, replacing any prior one.
    pub(crate) async fn attach(&self, link: Link, peer: SocketAddr) {
        let mut guard = self.link.lock().await;
        *guard = Some(link);
        self.transition(|phase| {
            if !matches!(phase, ConnectionPhase::Connecting) {
                phase.force_disconnect();
                phase.begin_connect()?;
            }
            phase.complete_connect(peer)
        });
    }

    /// Drop the current connection, if any.
    pub(crate) async fn detach(&self) {
        self.link.lock().await.take();
    }
}

// ── TransportManager ─────────────────────────────────────────────

/// Client or server TCP endpoint with reconnect handling.
///
/// # Lifetime
///
/// [`start`](Self::start) connects (client) or begins listening
/// (server). [`stop`](Self::stop) releases every socket and joins the
/// accept loop; it is idempotent and also runs on drop.
pub struct TransportManager {
    config: TransportConfig,
    runtime: Runtime,
    shared: Arc<Shared>,
    commands: Option<mpsc::UnboundedSender<ListenerCommand>>,
    listener: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    local_addr: Option<SocketAddr>,
    started: bool,
}

impl TransportManager {
    /// Create a stopped manager.
    pub fn new(config: TransportConfig) -> Result<Self, IqtapError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("iqtap-transport")
            .enable_all()
            .build()
            .map_err(|e| IqtapError::Runtime(e.to_string()))?;

        Ok(Self {
            config,
            runtime,
            shared: Arc::new(Shared::new()),
            commands: None,
            listener: None,
            cancel: CancellationToken::new(),
            local_addr: None,
            started: false,
        })
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared.phase()
    }

    /// Bound listener address (server role, while started).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Connect (client) or start the accept loop (server).
    ///
    /// Client resolution and connect failures are returned here; there is
    /// no retry.
    pub fn start(&mut self) -> Result<(), IqtapError> {
        if self.started {
            return Err(IqtapError::AlreadyStarted);
        }
        self.cancel = CancellationToken::new();

        match self.config.role {
            Role::Client => self.start_client()?,
            Role::Server => self.start_server()?,
        }
        self.started = true;
        Ok(())
    }

    fn start_client(&mut self) -> Result<(), IqtapError> {
        let TransportConfig { host, port, .. } = &self.config;
        info!(%host, port, "connecting");

        self.shared.transition(|phase| phase.begin_connect());
        let connected = self.runtime.block_on(connect(host, *port));
        let (stream, peer) = match connected {
            Ok(pair) => pair,
            Err(e) => {
                self.shared.transition(|phase| phase.finish_close());
                return Err(e);
            }
        };

        self.runtime.block_on(self.shared.attach(Box::new(stream), peer));
        info!(%peer, "connected");
        Ok(())
    }

    fn start_server(&mut self) -> Result<(), IqtapError> {
        let TransportConfig { host, port, .. } = &self.config;
        let listener = self.runtime.block_on(bind(host, *port))?;
        self.local_addr = Some(listener.local_addr()?);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.runtime.spawn(run_listener(
            listener,
            Arc::clone(&self.shared),
            rx,
            self.cancel.clone(),
        ));
        // The loop is idle until the first request.
        let _ = tx.send(ListenerCommand::Listen);

        self.commands = Some(tx);
        self.listener = Some(handle);
        Ok(())
    }

    /// Block until a peer is attached or `timeout` elapses.
    pub fn wait_for_connection(&self, timeout: Duration) -> bool {
        let mut rx = self.shared.subscribe();
        self.runtime.block_on(async move {
            matches!(
                tokio::time::timeout(timeout, rx.wait_for(ConnectionPhase::is_connected)).await,
                Ok(Ok(_))
            )
        })
    }

    /// Write all of `buf` to the current connection.
    ///
    /// Blocks until every byte is accepted or an error ends the loop.
    /// Reset and broken-pipe errors drop the connection: a server re-arms
    /// its accept loop, a client reports [`WriteStatus::EndOfStream`].
    pub fn write(&self, buf: &[u8]) -> WriteStatus {
        if buf.is_empty() {
            return WriteStatus::Sent(0);
        }
        self.runtime.block_on(self.write_locked(buf))
    }

    async fn write_locked(&self, buf: &[u8]) -> WriteStatus {
        let mut guard = self.shared.link.lock().await;
        let Some(link) = guard.as_mut() else {
            return WriteStatus::NotConnected;
        };

        let report = write_counted(link, buf).await;
        let sent = report.sent;
        match report.outcome {
            WriteOutcome::Complete => WriteStatus::Sent(sent),
            WriteOutcome::Disconnected(e) => {
                *guard = None;
                drop(guard);
                let uptime = self.shared.phase().connected_duration();
                self.shared.transition(|phase| {
                    phase.force_disconnect();
                    Ok(())
                });

                match self.config.role {
                    Role::Client => {
                        warn!(error = %e, sent, ?uptime, "server closed the connection; stopping processing");
                        WriteStatus::EndOfStream { sent }
                    }
                    Role::Server => {
                        info!(error = %e, sent, ?uptime, "client disconnected; waiting for new connection");
                        self.request_listen();
                        WriteStatus::Disconnected { sent }
                    }
                }
            }
            WriteOutcome::Failed(e) => {
                warn!(error = %e, sent, "write failed");
                WriteStatus::Failed {
                    sent,
                    kind: e.kind(),
                }
            }
        }
    }

    fn request_listen(&self) {
        match &self.commands {
            Some(tx) if tx.send(ListenerCommand::Listen).is_ok() => {}
            _ => debug!("no accept loop to re-arm"),
        }
    }

    /// Release every network resource. Safe to call more than once.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(tx) = self.commands.take() {
            let _ = tx.send(ListenerCommand::Stop);
        }
        let was_started = std::mem::replace(&mut self.started, false);
        if was_started {
            self.shared.transition(|phase| phase.begin_close());
        }

        let shared = Arc::clone(&self.shared);
        let listener = self.listener.take();
        self.runtime.block_on(async move {
            if let Some(mut link) = shared.link.lock().await.take() {
                if let Err(e) = link.shutdown().await {
                    debug!(error = %e, "socket shutdown");
                }
            }
            if let Some(handle) = listener {
                if let Err(e) = handle.await {
                    warn!(error = %e, "listener task ended abnormally");
                }
            }
        });

        self.shared.transition(|phase| {
            phase.force_disconnect();
            Ok(())
        });
        if was_started {
            info!(role = ?self.config.role, "transport stopped");
        }
        self.local_addr = None;
    }

    /// Install a connection directly, bypassing connect/accept.
    #[cfg(test)]
    pub(crate) fn attach(&self, link: Link, peer: SocketAddr) {
        self.runtime.block_on(self.shared.attach(link, peer));
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Socket setup ─────────────────────────────────────────────────

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, IqtapError> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| IqtapError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    addrs.next().ok_or_else(|| IqtapError::NoAddress {
        host: host.to_string(),
        port,
    })
}

fn new_socket(addr: SocketAddr) -> std::io::Result<TcpSocket> {
    let socket = if addr.is_ipv6() {
        TcpSocket::new_v6()?
    } else {
        TcpSocket::new_v4()?
    };
    socket.set_keepalive(true)?;
    Ok(socket)
}

async fn connect(host: &str, port: u16) -> Result<(TcpStream, SocketAddr), IqtapError> {
    let addr = resolve(host, port).await?;
    let socket = new_socket(addr).map_err(|source| IqtapError::Connect { addr, source })?;
    let stream = socket
        .connect(addr)
        .await
        .map_err(|source| IqtapError::Connect { addr, source })?;
    Ok((stream, addr))
}

/// Bind the listening socket. Accepted sockets get keep-alive from the
/// accept loop.
async fn bind(host: &str, port: u16) -> Result<TcpListener, IqtapError> {
    let addr = resolve(host, port).await?;
    let listen = || -> std::io::Result<TcpListener> {
        let socket = new_socket(addr)?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(1)
    };
    let listener = listen().map_err(|source| IqtapError::Bind { addr, source })?;
    info!(%addr, "listening");
    Ok(listener)
}

// ── Tests ────────────────────────────────────────────────────────
