//! Per-connection session: frame reassembly, heartbeat echo, dispatch.
//!
//! Each accepted socket gets one session. The read half feeds a frame
//! assembler; heartbeat frames are echoed inline, every other frame is
//! dispatched in its own task so a slow handler never blocks the
//! connection. Responses therefore complete, and are written, in whatever
//! order the handlers finish. All writes funnel through one outbound
//! channel so frames never interleave on the wire.
//!
//! A session dies on remote disconnect, socket error, stream
//! desynchronization, liveness timeout, or server shutdown. In-flight
//! dispatches for a dead session run to completion but their responses
//! are dropped on the floor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use osprey_protocol::{Codec, FrameAssembler};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::heartbeat::HeartbeatMonitor;
use crate::server::{RequestHandler, TransportConfig};

const OUTBOUND_QUEUE: usize = 64;

/// Owns one accepted socket end to end.
pub struct ConnectionSession<H: RequestHandler> {
    id: Uuid,
    peer: SocketAddr,
    socket: TcpStream,
    handler: Arc<H>,
    codec: Arc<dyn Codec>,
    config: TransportConfig,
    shutdown: watch::Receiver<bool>,
}

impl<H: RequestHandler> ConnectionSession<H> {
    pub fn new(
        socket: TcpStream,
        peer: SocketAddr,
        handler: Arc<H>,
        codec: Arc<dyn Codec>,
        config: TransportConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            socket,
            handler,
            codec,
            config,
            shutdown,
        }
    }

    pub async fn run(self) {
        let Self {
            id,
            peer,
            socket,
            handler,
            codec,
            config,
            mut shutdown,
        } = self;

        debug!("connection {id} opened from {peer}");

        let (mut reader, writer) = socket.into_split();
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(OUTBOUND_QUEUE);
        let monitor = Arc::new(HeartbeatMonitor::new(Duration::from_millis(
            config.heartbeat_timeout_ms,
        )));

        // Single writer task; closes the socket once every sender is gone.
        let writer_handle = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = writer.write_all(&frame).await {
                    debug!("connection {id} write failed: {e}");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let mut assembler = FrameAssembler::new(config.max_frame_len);
        let mut probe = tokio::time::interval(Duration::from_millis(
            config.heartbeat_probe_interval_ms,
        ));
        probe.tick().await; // first tick fires immediately
        let mut chunk = vec![0u8; 16 * 1024];

        'session: loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("connection {id} closing: server shutdown");
                    break 'session;
                }

                _ = probe.tick() => {
                    if monitor.is_stale() {
                        warn!(
                            "connection {id} closed: no write for {:?} (liveness timeout)",
                            monitor.idle_for()
                        );
                        break 'session;
                    }
                }

                read = reader.read(&mut chunk) => {
                    let n = match read {
                        Ok(0) => {
                            debug!("connection {id} closed by peer {peer}");
                            break 'session;
                        }
                        Ok(n) => n,
                        Err(e) => {
                            warn!("connection {id} read failed: {e}");
                            break 'session;
                        }
                    };
                    assembler.extend(&chunk[..n]);
                    loop {
                        match assembler.next_frame() {
                            Ok(Some(frame)) => {
                                on_frame(frame, &handler, &codec, &monitor, &out_tx);
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!("connection {id} dropped: {e}");
                                break 'session;
                            }
                        }
                    }
                }
            }
        }

        // Dropping the session's sender lets the writer drain queued
        // responses and close the socket; in-flight dispatch tasks still
        // hold clones and their sends fail silently once the writer is gone.
        drop(out_tx);
        let _ = writer_handle.await;
        debug!("connection {id} session ended");
    }
}

/// Route one complete frame: heartbeats are echoed without touching the
/// dispatcher, everything else is dispatched concurrently.
fn on_frame<H: RequestHandler>(
    frame: Bytes,
    handler: &Arc<H>,
    codec: &Arc<dyn Codec>,
    monitor: &Arc<HeartbeatMonitor>,
    out_tx: &mpsc::Sender<Bytes>,
) {
    if codec.is_heartbeat(&frame) {
        monitor.record_write();
        let echo = codec.encode_heartbeat();
        let tx = out_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(echo).await;
        });
        return;
    }

    let handler = handler.clone();
    let monitor = monitor.clone();
    let tx = out_tx.clone();
    tokio::spawn(async move {
        let response = handler.dispatch(frame).await;
        monitor.record_write();
        let _ = tx.send(response).await;
    });
}
