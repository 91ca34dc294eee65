//! Port selection — supplier of candidate ports for the startup supervisor.

use std::io;
use std::net::TcpListener;

/// Supplies a candidate port number. The supervisor still has to bind it;
/// a stale answer (the port was taken in between) surfaces as a bind
/// failure and goes through the retry budget.
pub trait PortAllocator: Send + Sync + 'static {
    fn get_available_port(&self) -> io::Result<u16>;
}

/// Asks the OS for a free port by briefly binding port 0.
pub struct OsPortAllocator;

impl PortAllocator for OsPortAllocator {
    fn get_available_port(&self) -> io::Result<u16> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Always proposes the same port (explicit `--port`, tests).
pub struct FixedPortAllocator {
    port: u16,
}

impl FixedPortAllocator {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl PortAllocator for FixedPortAllocator {
    fn get_available_port(&self) -> io::Result<u16> {
        Ok(self.port)
    }
}
