//! Osprey RPC — Transport Layer
//!
//! Owns the TCP side of the server:
//! - the accept loop and connection limit
//! - per-connection sessions (frame reassembly, heartbeat echo, response writes)
//! - liveness tracking with forced close on timeout
//!
//! The transport is decoupled from dispatch logic via the [`RequestHandler`]
//! trait: it hands every non-heartbeat frame to the handler and writes back
//! whatever encoded response comes out. Responses are written in completion
//! order, not arrival order — per-connection sequencing is deliberately not
//! enforced.

pub mod connection;
pub mod heartbeat;
pub mod server;

pub use heartbeat::HeartbeatMonitor;
pub use server::{RequestHandler, TcpTransport, TransportConfig};
