//! Shared network protocol logic.
//!
//! This crate contains transport-independent protocol components:
//!
//! - [`wire`]: LZ4 compress/decompress helpers
//! - [`codec`]: request/response frame encode/decode
//! - [`topic`]: gossipsub topic builder/parser
//!
//! No async runtime dependency; the node crate drives transport-specific
//! I/O around these.

pub mod codec;
pub mod topic;
pub mod wire;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, CodecError, RequestFrame,
    ResponseFrame, ResponseStatus,
};
pub use topic::Topic;
pub use wire::{compress, decompress, WireError};
