//! TCP listener ownership: accept loop, connection limit, shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use osprey_protocol::Codec;
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::connection::ConnectionSession;

/// Trait implemented by the dispatch side. The transport calls this for
/// every complete non-heartbeat frame; the returned bytes are written back
/// to the socket as-is. Implementations must be infallible: every failure
/// mode is expected to come back as an encoded error response.
pub trait RequestHandler: Send + Sync + 'static {
    fn dispatch(&self, frame: Bytes) -> impl std::future::Future<Output = Bytes> + Send;
}

/// Transport tuning knobs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum concurrent connections; excess sockets are closed at accept.
    pub max_connections: Option<usize>,
    /// Liveness timeout: no write for this long closes the connection.
    pub heartbeat_timeout_ms: u64,
    /// How often the per-connection watchdog checks for staleness.
    pub heartbeat_probe_interval_ms: u64,
    /// Largest accepted frame payload.
    pub max_frame_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: Some(1024),
            heartbeat_timeout_ms: 60_000,
            heartbeat_probe_interval_ms: 20_000,
            max_frame_len: 4 * 1024 * 1024,
        }
    }
}

/// The running TCP transport: accept loop plus live sessions.
pub struct TcpTransport {
    shutdown_tx: Option<mpsc::Sender<()>>,
    session_shutdown: watch::Sender<bool>,
    handle: Option<tokio::task::JoinHandle<()>>,
    port: u16,
    client_count: Arc<AtomicUsize>,
}

impl TcpTransport {
    /// Serve connections on an already-bound listener. Binding (and the
    /// retry policy around it) is the startup supervisor's job, not the
    /// transport's.
    pub async fn serve<H: RequestHandler>(
        listener: TcpListener,
        handler: Arc<H>,
        codec: Arc<dyn Codec>,
        config: TransportConfig,
    ) -> std::io::Result<Self> {
        let port = listener.local_addr()?.port();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let (session_shutdown, _) = watch::channel(false);
        let client_count = Arc::new(AtomicUsize::new(0));

        let accept_count = client_count.clone();
        let accept_session_shutdown = session_shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let (socket, peer) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                warn!("accept failed: {e}");
                                continue;
                            }
                        };

                        if let Some(max) = config.max_connections {
                            if accept_count.load(Ordering::Relaxed) >= max {
                                warn!("connection from {peer} rejected: max connections reached ({max})");
                                drop(socket);
                                continue;
                            }
                        }

                        let session = ConnectionSession::new(
                            socket,
                            peer,
                            handler.clone(),
                            codec.clone(),
                            config.clone(),
                            accept_session_shutdown.subscribe(),
                        );
                        let count = accept_count.clone();
                        count.fetch_add(1, Ordering::Relaxed);
                        tokio::spawn(async move {
                            session.run().await;
                            count.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                }
            }
        });

        info!("rpc transport listening on port {port}");

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            session_shutdown,
            handle: Some(handle),
            port,
            client_count,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of live connections.
    pub fn connections(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    /// Stop accepting, close live sessions, and wait for the accept loop.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        let _ = self.session_shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("rpc transport stopped");
    }
}
