//! Codec and framing errors.

use thiserror::Error;

/// Failure while framing or (de)coding a message.
///
/// Frame-level variants (`BadMagic`, `Oversized`) mean the byte stream is
/// desynchronized and the connection must be dropped; payload-level
/// variants only fail the single request they belong to.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame shorter than the {0}-byte header")]
    Truncated(usize),

    #[error("bad frame magic 0x{0:04x}")]
    BadMagic(u16),

    #[error("frame length {got} exceeds limit {limit}")]
    Oversized { got: usize, limit: usize },

    #[error("heartbeat frame carries no request payload")]
    HeartbeatFrame,

    #[error("invalid request payload: {0}")]
    Payload(#[from] serde_json::Error),
}
