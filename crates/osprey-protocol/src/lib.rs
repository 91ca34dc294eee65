//! Osprey RPC — Protocol Types
//!
//! Wire-facing types for the Osprey RPC protocol: requests with routing
//! attachments, responses with status codes, the frame codec, and the
//! assembler that splits a TCP byte stream into discrete frames.
//! This crate is the single source of truth for the wire boundary — the
//! transport and server crates consume it without knowing byte layouts.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{BinaryJsonCodec, Codec, FLAG_HEARTBEAT, FRAME_HEADER_LEN, FRAME_MAGIC};
pub use error::CodecError;
pub use frame::FrameAssembler;
pub use message::{
    Attachment, RpcRequest, RpcResponse, StatusCode, DEFAULT_REQUEST_VERSION, VERSION_WILDCARD,
};
