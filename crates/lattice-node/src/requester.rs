//! Outbound single-peer requests.
//!
//! One request/response exchange on a fresh stream: generate and register
//! a request id, write the framed query, read exactly one framed reply,
//! validate it, and clean up the registry on every path. Every stream
//! operation runs under the configured request deadline so a silent peer
//! cannot pin the stream forever.
//!
//! Validation failures are protocol violations and ban the peer:
//! a mismatched response id, a payload of the wrong kind, or a by-hash
//! payload whose digest differs from the request. Not-found and transport
//! failures are ordinary misses and do not.

use crate::framing::{self, MAX_FRAME_SIZE};
use crate::node::NodeInner;
use crate::request_id::RegistryError;
use futures::AsyncWriteExt;
use lattice_network::codec::{self, CodecError, ResponseStatus};
use lattice_types::{Hash, Location, Payload, Selector, TypeTag};
use libp2p::{PeerId, Stream};
use thiserror::Error;
use tracing::debug;

/// Errors from a single-peer request attempt.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Stream open, write, or read exceeded the request deadline.
    #[error("request timed out")]
    Timeout,

    /// The stream to the peer could not be opened.
    #[error("failed to open stream: {0}")]
    StreamOpen(String),

    /// Stream I/O failed mid-exchange.
    #[error("stream I/O error: {0}")]
    Io(String),

    /// The response bytes did not decode. The peer is suspect but not
    /// banned; framing trouble can be version skew.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The response correlates to a different request. Protocol
    /// violation; the peer is banned.
    #[error("peer returned request id {got}, expected {expected}")]
    RequestIdMismatch { expected: u32, got: u32 },

    /// The payload kind does not answer the requested tag. Protocol
    /// violation; the peer is banned.
    #[error("peer returned a {got:?} payload for a {expected:?} request")]
    WrongPayloadKind { expected: TypeTag, got: TypeTag },

    /// A by-hash response whose digest is not the requested one.
    /// Protocol violation; the peer is banned.
    #[error("peer returned payload with hash {got}, requested {requested}")]
    HashMismatch { requested: Hash, got: Hash },

    /// The peer answered honestly that it lacks the entity.
    #[error("peer does not have the requested entity")]
    NotFound,

    /// The peer does not serve this request kind.
    #[error("peer does not serve this request kind")]
    NotImplemented,
}

/// Check a response payload against what was requested.
///
/// By-hash requests require the payload's digest to equal the selector
/// hash. By-number requests accept any hash: there is no cheap way to
/// verify a number-to-hash binding at this layer.
pub(crate) fn validate_response(
    tag: TypeTag,
    selector: &Selector,
    payload: &Payload,
) -> Result<(), RequestError> {
    let got = payload.kind();
    if got != tag {
        return Err(RequestError::WrongPayloadKind { expected: tag, got });
    }

    if let Selector::Hash(requested) = selector {
        let got = payload.hash();
        if got != *requested {
            return Err(RequestError::HashMismatch {
                requested: *requested,
                got,
            });
        }
    }

    Ok(())
}

impl NodeInner {
    /// Request one entity from one peer.
    ///
    /// The stream is closed on every path, and the registry entry is
    /// removed on every path, error or not.
    pub(crate) async fn request_from_peer(
        &self,
        peer: PeerId,
        location: Location,
        selector: Selector,
        tag: TypeTag,
    ) -> Result<Payload, RequestError> {
        let deadline = self.config.request_timeout;

        let mut stream = tokio::time::timeout(deadline, self.adapter.open_stream(peer))
            .await
            .map_err(|_| RequestError::Timeout)?
            .map_err(|e| RequestError::StreamOpen(e.to_string()))?;

        let result = self
            .exchange(&mut stream, peer, location, selector, tag)
            .await;
        let _ = stream.close().await;
        result
    }

    /// Run the framed exchange on an open stream.
    async fn exchange(
        &self,
        stream: &mut Stream,
        peer: PeerId,
        location: Location,
        selector: Selector,
        tag: TypeTag,
    ) -> Result<Payload, RequestError> {
        let id = self.registry.generate();
        self.registry.add(id)?;

        let request = match codec::encode_request(id, tag, location, selector.clone()) {
            Ok(request) => request,
            Err(e) => {
                self.registry.remove(id);
                return Err(e.into());
            }
        };

        let response_bytes = match self.write_then_read(stream, &request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.registry.remove(id);
                return Err(e);
            }
        };

        let frame = match codec::decode_response(&response_bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.registry.remove(id);
                return Err(e.into());
            }
        };

        if frame.id != id {
            self.registry.remove(id);
            self.ban_peer(peer);
            return Err(RequestError::RequestIdMismatch {
                expected: id,
                got: frame.id,
            });
        }
        self.registry.remove(id);

        let payload = match frame.status {
            ResponseStatus::Found(payload) => payload,
            ResponseStatus::NotFound => {
                debug!(peer = %peer, id, "peer does not have the entity");
                return Err(RequestError::NotFound);
            }
            ResponseStatus::NotImplemented => return Err(RequestError::NotImplemented),
        };

        if let Err(e) = validate_response(tag, &selector, &payload) {
            self.ban_peer(peer);
            return Err(e);
        }

        Ok(payload)
    }

    /// Write the request frame, then read exactly one response frame,
    /// each under the request deadline.
    async fn write_then_read(
        &self,
        stream: &mut Stream,
        request: &[u8],
    ) -> Result<Vec<u8>, RequestError> {
        let deadline = self.config.request_timeout;

        tokio::time::timeout(deadline, framing::write_frame(stream, request))
            .await
            .map_err(|_| RequestError::Timeout)?
            .map_err(|e| RequestError::Io(e.to_string()))?;

        match tokio::time::timeout(deadline, framing::read_frame(stream, MAX_FRAME_SIZE)).await {
            Err(_) => Err(RequestError::Timeout),
            Ok(Err(e)) => Err(RequestError::Io(e.to_string())),
            Ok(Ok(bytes)) => Ok(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::{Block, BlockNumber, Header};

    fn block() -> Block {
        Block {
            header: Header {
                location: Location::Zone(0, 1),
                number: BlockNumber::from(5u64),
                parent_hash: Hash::from_bytes(b"parent"),
                state_root: Hash::from_bytes(b"state"),
            },
            body: vec![9],
        }
    }

    #[test]
    fn test_by_hash_response_must_match_requested_hash() {
        let b = block();
        let hash = b.hash();
        let payload = Payload::Block(b);

        assert!(validate_response(TypeTag::Block, &Selector::Hash(hash), &payload).is_ok());

        let wrong = Hash::from_bytes(b"some other block");
        let err =
            validate_response(TypeTag::Block, &Selector::Hash(wrong), &payload).unwrap_err();
        assert!(matches!(
            err,
            RequestError::HashMismatch { requested, got }
                if requested == wrong && got == hash
        ));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let b = block();
        let header_hash = b.header.hash();
        let payload = Payload::Header(b.header);

        let err = validate_response(TypeTag::Block, &Selector::Hash(header_hash), &payload)
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::WrongPayloadKind {
                expected: TypeTag::Block,
                got: TypeTag::Header,
            }
        ));
    }

    #[test]
    fn test_by_number_response_accepts_any_hash() {
        let payload = Payload::BlockHash(Hash::from_bytes(b"whatever the peer says"));
        let selector = Selector::Number(BlockNumber::from(42u64));
        assert!(validate_response(TypeTag::BlockHash, &selector, &payload).is_ok());
    }

    #[test]
    fn test_by_number_response_must_still_be_a_hash() {
        let payload = Payload::Block(block());
        let selector = Selector::Number(BlockNumber::from(42u64));
        assert!(validate_response(TypeTag::BlockHash, &selector, &payload).is_err());
    }
}
