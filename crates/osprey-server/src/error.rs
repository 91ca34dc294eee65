//! Server error taxonomy.
//!
//! Only [`ConfigError`] at construction and [`StartupError`] after retry
//! exhaustion are fatal to the server. Everything else is scoped to one
//! request (carried in its response status) or one connection.

use thiserror::Error;

/// Fatal configuration problems, surfaced before any networking begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a registry instance is required")]
    MissingRegistry,

    #[error("at least one service must be configured")]
    NoServices,

    #[error("middleware cannot be added after the server has started")]
    Sealed,
}

/// Fatal startup failures. Rejects the readiness signal; cloneable so
/// every waiter observes the same outcome.
#[derive(Debug, Clone, Error)]
pub enum StartupError {
    #[error("no available port after {attempts} bind attempts")]
    NoAvailablePort { attempts: u32 },

    #[error("listener setup failed: {0}")]
    Listen(String),

    #[error("server closed before startup completed")]
    Aborted,
}

/// Failure inside an invoked service method or a middleware handler.
/// Always caught at the pipeline boundary and turned into a
/// `ServerError` response, never propagated to the transport.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("{0}")]
    Failed(String),
}

impl InvokeError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result of one service method invocation.
pub type InvokeResult = Result<serde_json::Value, InvokeError>;
