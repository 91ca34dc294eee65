//! Startup supervision: bind with retry, registration, one-shot readiness.

use std::sync::Arc;

use osprey_registry::{PortAllocator, Registration, Registry, RetryBudget};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::StartupError;

/// One-shot readiness signal.
///
/// Resolves (or rejects) exactly once; later transitions are ignored.
/// Any number of tasks may wait, before or after resolution; they all
/// observe the same outcome.
pub struct ReadySignal {
    tx: watch::Sender<ReadyState>,
}

#[derive(Debug, Clone)]
enum ReadyState {
    Pending,
    Ready(u16),
    Failed(StartupError),
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReadyState::Pending);
        Self { tx }
    }

    pub fn resolve(&self, port: u16) {
        self.transition(ReadyState::Ready(port));
    }

    pub fn reject(&self, err: StartupError) {
        self.transition(ReadyState::Failed(err));
    }

    fn transition(&self, next: ReadyState) {
        self.tx.send_if_modified(|state| {
            if matches!(state, ReadyState::Pending) {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Wait for resolution. Returns the bound port, or the fatal startup
    /// error every other waiter sees too.
    pub async fn wait(&self) -> Result<u16, StartupError> {
        let mut rx = self.tx.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                match &*state {
                    ReadyState::Ready(port) => return Ok(*port),
                    ReadyState::Failed(e) => return Err(e.clone()),
                    ReadyState::Pending => {}
                }
            }
            if rx.changed().await.is_err() {
                return Err(StartupError::Aborted);
            }
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the startup state machine:
/// INIT → BINDING → LISTENING → REGISTERING → READY, cycling
/// BINDING → RETRYING → BINDING on bind failure until the retry budget
/// runs dry, which is terminal.
pub struct StartupSupervisor {
    host: String,
    allocator: Arc<dyn PortAllocator>,
    retry: RetryBudget,
}

impl StartupSupervisor {
    pub fn new(host: impl Into<String>, allocator: Arc<dyn PortAllocator>, retry: RetryBudget) -> Self {
        Self {
            host: host.into(),
            allocator,
            retry,
        }
    }

    /// Acquire a candidate port and bind it, retrying within the budget.
    /// Success resets the budget so a future rebind starts clean;
    /// exhaustion is fatal and the caller must reject readiness.
    pub async fn bind(&mut self) -> Result<TcpListener, StartupError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let bound = match self.allocator.get_available_port() {
                Ok(port) => TcpListener::bind((self.host.as_str(), port))
                    .await
                    .map_err(|e| (port, e.to_string())),
                Err(e) => Err((0, format!("port allocation failed: {e}"))),
            };

            match bound {
                Ok(listener) => {
                    self.retry.reset();
                    return Ok(listener);
                }
                Err((port, reason)) => {
                    warn!("bind attempt {attempts} on {}:{port} failed: {reason}", self.host);
                    if !self.retry.retry().await {
                        error!("bind retry budget exhausted after {attempts} attempts");
                        return Err(StartupError::NoAvailablePort { attempts });
                    }
                }
            }
        }
    }

    /// Publish the bound endpoint. A registry failure is logged and
    /// swallowed: the server is already accepting connections, so
    /// discovery trouble must not block readiness.
    pub async fn register(registry: &Arc<dyn Registry>, registration: Registration) {
        let application = registration.application.clone();
        let port = registration.port;
        match registry.register(registration).await {
            Ok(()) => info!("{application} registered on port {port}"),
            Err(e) => error!("service registration failed for {application}: {e}"),
        }
    }
}
