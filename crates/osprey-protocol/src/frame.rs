//! Frame reassembly — splits a raw byte stream into discrete frames.

use bytes::{Bytes, BytesMut};

use crate::codec::{FRAME_HEADER_LEN, FRAME_MAGIC};
use crate::error::CodecError;

/// Incremental frame assembler for one connection.
///
/// Feed it whatever the socket read returned, then drain complete frames
/// with [`next_frame`](Self::next_frame). Yielded frames include the
/// header, so [`Codec::is_heartbeat`](crate::Codec::is_heartbeat) works on
/// them directly. A `BadMagic` or `Oversized` error means the stream is
/// desynchronized; the caller must drop the connection.
pub struct FrameAssembler {
    buf: BytesMut,
    max_frame_len: usize,
}

impl FrameAssembler {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(FRAME_HEADER_LEN * 2),
            max_frame_len,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete frame, or `None` while the buffer holds only
    /// a partial one.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, CodecError> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let magic = u16::from_be_bytes([self.buf[0], self.buf[1]]);
        if magic != FRAME_MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let len = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        if len > self.max_frame_len {
            return Err(CodecError::Oversized {
                got: len,
                limit: self.max_frame_len,
            });
        }
        if self.buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(FRAME_HEADER_LEN + len).freeze()))
    }

    /// Bytes currently buffered (partial frame included).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
