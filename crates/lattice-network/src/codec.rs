//! Request and response frame encoding.
//!
//! # Wire Format
//!
//! Frame bodies are SBOR-encoded then LZ4-compressed:
//!
//! ```text
//! [LZ4 compressed SBOR frame]
//! ```
//!
//! A request carries `(id, tag, location, selector)`; a response carries
//! `(id, status)` where the status is the payload, an explicit not-found
//! marker, or a not-implemented marker. Responders echo the request id
//! unchanged so the requester can correlate frames across streams.

use crate::wire;
use lattice_types::{Location, Payload, Selector, TypeTag};
use sbor::prelude::*;
use thiserror::Error;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),

    #[error("decompression error: {0}")]
    Decompress(String),

    #[error("selector kind is not legal for tag {tag:?}")]
    IllegalSelector { tag: TypeTag },
}

/// One framed query as it travels between peers.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub struct RequestFrame {
    /// Correlation id, unique among the sender's pending requests.
    pub id: u32,
    /// What is being asked for.
    pub tag: TypeTag,
    /// Which slice to ask about.
    pub location: Location,
    /// How the entity is identified.
    pub selector: Selector,
}

/// Outcome carried by a response frame.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub enum ResponseStatus {
    /// The responder had the entity.
    Found(Payload),
    /// The responder looked and does not have the entity.
    NotFound,
    /// The responder does not serve this request kind yet.
    NotImplemented,
}

/// One framed reply, correlated to its request by id.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub struct ResponseFrame {
    /// Echo of the request id.
    pub id: u32,
    /// The outcome.
    pub status: ResponseStatus,
}

fn sbor_encode<T: BasicEncode>(value: &T) -> Result<Vec<u8>, CodecError> {
    basic_encode(value).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))
}

fn sbor_decode<T: BasicDecode>(data: &[u8]) -> Result<T, CodecError> {
    basic_decode(data).map_err(|e| CodecError::SborDecode(format!("{:?}", e)))
}

/// Encode a request frame to wire bytes.
///
/// Rejects `(tag, selector)` pairs outside the legality table so an
/// illegal query can never leave this node.
pub fn encode_request(
    id: u32,
    tag: TypeTag,
    location: Location,
    selector: Selector,
) -> Result<Vec<u8>, CodecError> {
    if !tag.admits(&selector) {
        return Err(CodecError::IllegalSelector { tag });
    }
    let frame = RequestFrame {
        id,
        tag,
        location,
        selector,
    };
    Ok(wire::compress(&sbor_encode(&frame)?))
}

/// Decode a request frame from wire bytes.
///
/// The legality table is enforced on this side too: a peer sending a
/// by-number block query (or a by-hash number query) gets a decode error,
/// not a dispatch.
pub fn decode_request(data: &[u8]) -> Result<RequestFrame, CodecError> {
    let body = wire::decompress(data).map_err(|e| CodecError::Decompress(e.to_string()))?;
    let frame: RequestFrame = sbor_decode(&body)?;
    if !frame.tag.admits(&frame.selector) {
        return Err(CodecError::IllegalSelector { tag: frame.tag });
    }
    Ok(frame)
}

/// Encode a response frame to wire bytes.
pub fn encode_response(id: u32, status: ResponseStatus) -> Result<Vec<u8>, CodecError> {
    let frame = ResponseFrame { id, status };
    Ok(wire::compress(&sbor_encode(&frame)?))
}

/// Decode a response frame from wire bytes.
pub fn decode_response(data: &[u8]) -> Result<ResponseFrame, CodecError> {
    let body = wire::decompress(data).map_err(|e| CodecError::Decompress(e.to_string()))?;
    sbor_decode(&body)
}

/// Encode a gossip payload to wire bytes.
///
/// Gossip carries a bare [`Payload`]; the kind travels in the topic, the
/// originating slice in the topic's location segment.
pub fn encode_gossip(payload: &Payload) -> Result<Vec<u8>, CodecError> {
    Ok(wire::compress(&sbor_encode(payload)?))
}

/// Decode a gossip payload from wire bytes.
pub fn decode_gossip(data: &[u8]) -> Result<Payload, CodecError> {
    let body = wire::decompress(data).map_err(|e| CodecError::Decompress(e.to_string()))?;
    sbor_decode(&body)
}
