//! Osprey RPC — Server Core
//!
//! The request-dispatch and connection-lifecycle engine: routes decoded
//! requests to registered providers by (interface, group, version), runs
//! the middleware pipeline around each call, and supervises startup
//! (bind with retry, registry registration, one-shot readiness).
//!
//! The transport layer calls back into [`RequestDispatcher`] through
//! `osprey_transport::RequestHandler`; everything above the socket lives
//! here.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod service;
pub mod supervisor;

pub use context::{CallContext, RequestContext};
pub use dispatcher::RequestDispatcher;
pub use error::{ConfigError, InvokeError, InvokeResult, StartupError};
pub use middleware::{Middleware, MiddlewarePipeline, Next};
pub use router::{ServiceDescriptor, ServiceRouter};
pub use server::{RpcServer, ServerConfig, ServiceConfig};
pub use service::Service;
pub use supervisor::ReadySignal;
