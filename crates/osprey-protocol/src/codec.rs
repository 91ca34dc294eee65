//! Frame codec — the opaque encode/decode boundary the transport and
//! dispatcher consume.
//!
//! Frame layout of the default [`BinaryJsonCodec`]:
//!
//! ```text
//! 0        2        3        4        8
//! +--------+--------+--------+--------+----------------+
//! | magic  | flags  | rsvd   | length (u32 BE)         | payload (JSON) |
//! +--------+--------+--------+--------+----------------+
//! ```
//!
//! A heartbeat is a zero-length frame with [`FLAG_HEARTBEAT`] set, so
//! liveness traffic is recognized from the header alone without touching
//! the payload decoder.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::message::{RpcRequest, RpcResponse};

/// Leading two bytes of every frame.
pub const FRAME_MAGIC: u16 = 0x4F52;

/// Fixed header length in bytes.
pub const FRAME_HEADER_LEN: usize = 8;

/// Flag bit marking a heartbeat frame.
pub const FLAG_HEARTBEAT: u8 = 0x01;

const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// The wire codec boundary.
///
/// `is_heartbeat` must be answerable from the frame header alone so the
/// connection session can echo liveness traffic without running the
/// request decoder or allocating any per-request state.
pub trait Codec: Send + Sync + 'static {
    /// Whether `frame` is a heartbeat rather than a request.
    fn is_heartbeat(&self, frame: &[u8]) -> bool;

    /// Encode the heartbeat echo frame.
    fn encode_heartbeat(&self) -> Bytes;

    /// Decode a complete request frame into an [`RpcRequest`].
    fn decode_request(&self, frame: Bytes) -> Result<RpcRequest, CodecError>;

    /// Encode a finalized response. Infallible: encoding trouble degrades
    /// to a well-formed server-error frame, never a dropped response.
    fn encode_response(&self, response: &RpcResponse) -> Bytes;
}

/// Default codec: fixed binary header, JSON payloads.
pub struct BinaryJsonCodec {
    max_frame_len: usize,
}

impl BinaryJsonCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Build a request frame. Lives on the codec so tests and the demo
    /// client-side helpers share one encoder with the server.
    pub fn encode_request(&self, request: &RpcRequest) -> Result<Bytes, CodecError> {
        let payload = serde_json::to_vec(request)?;
        Ok(write_frame(0, &payload))
    }

    fn payload<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8], CodecError> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(CodecError::Truncated(FRAME_HEADER_LEN));
        }
        let magic = u16::from_be_bytes([frame[0], frame[1]]);
        if magic != FRAME_MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let len = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
        if len > self.max_frame_len {
            return Err(CodecError::Oversized {
                got: len,
                limit: self.max_frame_len,
            });
        }
        if frame.len() < FRAME_HEADER_LEN + len {
            return Err(CodecError::Truncated(FRAME_HEADER_LEN + len));
        }
        Ok(&frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len])
    }
}

impl Default for BinaryJsonCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Codec for BinaryJsonCodec {
    fn is_heartbeat(&self, frame: &[u8]) -> bool {
        frame.len() >= FRAME_HEADER_LEN
            && u16::from_be_bytes([frame[0], frame[1]]) == FRAME_MAGIC
            && frame[2] & FLAG_HEARTBEAT != 0
    }

    fn encode_heartbeat(&self) -> Bytes {
        write_frame(FLAG_HEARTBEAT, &[])
    }

    fn decode_request(&self, frame: Bytes) -> Result<RpcRequest, CodecError> {
        if self.is_heartbeat(&frame) {
            return Err(CodecError::HeartbeatFrame);
        }
        let payload = self.payload(&frame)?;
        Ok(serde_json::from_slice(payload)?)
    }

    fn encode_response(&self, response: &RpcResponse) -> Bytes {
        let payload = serde_json::to_vec(response).unwrap_or_else(|e| {
            serde_json::to_vec(&RpcResponse::server_error(format!(
                "response encoding failed: {e}"
            )))
            .unwrap_or_default()
        });
        write_frame(0, &payload)
    }
}

fn write_frame(flags: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u16(FRAME_MAGIC);
    buf.put_u8(flags);
    buf.put_u8(0);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}
