//! Osprey RPC — Registry Boundary
//!
//! The server registers its bound endpoint with a service registry so
//! remote callers can discover it. This crate defines that boundary plus
//! the two startup collaborators that live next to it: the port allocator
//! and the bind-retry budget.
//!
//! The in-process [`MemoryRegistry`] is the default implementation; a real
//! discovery backend plugs in behind the same [`Registry`] trait.

pub mod port;
pub mod retry;

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use port::{FixedPortAllocator, OsPortAllocator, PortAllocator};
pub use retry::RetryBudget;

/// What the server publishes once it is listening.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    /// Application identity.
    pub application: String,
    /// Bound TCP port.
    pub port: u16,
    /// Protocol identity (e.g. "osprey").
    pub protocol: String,
    /// Interface names of every registered provider.
    pub interfaces: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry is closed")]
    Closed,

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Registry client boundary. Registration failures are reported to the
/// caller but the server treats them as non-fatal: it is already serving.
pub trait Registry: Send + Sync + 'static {
    fn register(&self, registration: Registration) -> BoxFuture<'_, Result<(), RegistryError>>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

/// In-process registry keyed by application name. Used by the demo binary
/// and the test suite; doubles as the reference implementation.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: DashMap<String, Registration>,
    closed: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the registration published under `application`.
    pub fn lookup(&self, application: &str) -> Option<Registration> {
        self.entries.get(application).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Registry for MemoryRegistry {
    fn register(&self, registration: Registration) -> BoxFuture<'_, Result<(), RegistryError>> {
        Box::pin(async move {
            if self.closed.load(Ordering::Acquire) {
                return Err(RegistryError::Closed);
            }
            info!(
                "registered {} on port {} ({} interfaces)",
                registration.application,
                registration.port,
                registration.interfaces.len()
            );
            self.entries
                .insert(registration.application.clone(), registration);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::Release);
            self.entries.clear();
        })
    }
}
