//! Connection liveness tracking.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Tracks the last outbound write on one connection.
///
/// Every response write and every heartbeat echo refreshes the timestamp;
/// the session's watchdog asks [`is_stale`](Self::is_stale) on an interval
/// and force-closes the socket when the connection has gone quiet for
/// longer than the timeout.
pub struct HeartbeatMonitor {
    last_write: Mutex<Instant>,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_write: Mutex::new(Instant::now()),
            timeout,
        }
    }

    pub fn record_write(&self) {
        *self.last_write.lock() = Instant::now();
    }

    pub fn is_stale(&self) -> bool {
        self.last_write.lock().elapsed() > self.timeout
    }

    pub fn idle_for(&self) -> Duration {
        self.last_write.lock().elapsed()
    }
}
