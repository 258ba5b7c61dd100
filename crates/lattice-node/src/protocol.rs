//! Inbound request/response protocol.
//!
//! Split in two layers, so the request semantics test without streams:
//!
//! - [`InboundHandler`]: pure request → response computation against a
//!   [`NodeFacade`]
//! - [`spawn_inbound_router`]: accepts streams negotiated for
//!   [`PROTOCOL_VERSION`](crate::adapter::PROTOCOL_VERSION), runs a framed
//!   read loop per stream, and replies on the same stream
//!
//! Protocol-identifier rejection is enforced by multistream negotiation:
//! the router registers its accept handle for exactly the lattice protocol
//! id, so a stream with any other id never reaches it.

use crate::adapter::PROTOCOL_VERSION;
use crate::framing::{self, FrameError, MAX_FRAME_SIZE};
use futures::{AsyncWriteExt, StreamExt};
use lattice_network::codec::{self, RequestFrame, ResponseFrame, ResponseStatus};
use lattice_types::{Block, BlockNumber, Hash, Header, Location, Payload, Selector, TypeTag};
use libp2p::{PeerId, Stream};
use libp2p_stream as stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Deadline for reading a request frame and writing its response.
const STREAM_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Lookup surface the inbound handler serves requests from.
///
/// The node implements this by consulting its cache and then the
/// consensus backend.
pub trait NodeFacade: Send + Sync + 'static {
    /// Block by hash, or `None` when unknown locally.
    fn get_block(&self, hash: Hash, location: Location) -> Option<Block>;

    /// Header by hash, or `None` when unknown locally.
    fn get_header(&self, hash: Hash, location: Location) -> Option<Header>;

    /// Hash of the block at `number`, or `None` when unknown locally.
    fn get_block_hash_by_number(&self, number: &BlockNumber, location: Location) -> Option<Hash>;
}

/// Pure inbound request handler, parameterized over the lookup surface.
pub struct InboundHandler<F> {
    facade: Arc<F>,
}

impl<F: NodeFacade> InboundHandler<F> {
    /// Create a handler serving from `facade`.
    pub fn new(facade: Arc<F>) -> Self {
        Self { facade }
    }

    /// Serve one decoded request.
    ///
    /// Every reply echoes the request id. An absent entity gets an
    /// explicit not-found reply, never silence. Returns `None` only for
    /// an illegal `(tag, selector)` pair, which the read loop skips.
    pub fn handle_request(&self, frame: RequestFrame) -> Option<ResponseFrame> {
        let location = frame.location;
        let status = match (frame.tag, &frame.selector) {
            (TypeTag::Block, Selector::Hash(hash)) => self
                .facade
                .get_block(*hash, location)
                .map(|block| ResponseStatus::Found(Payload::Block(block)))
                .unwrap_or(ResponseStatus::NotFound),

            (TypeTag::Header, Selector::Hash(hash)) => self
                .facade
                .get_header(*hash, location)
                .map(|header| ResponseStatus::Found(Payload::Header(header)))
                .unwrap_or(ResponseStatus::NotFound),

            // Reserved until transaction serving is populated.
            (TypeTag::Transaction, Selector::Hash(_)) => ResponseStatus::NotImplemented,

            (TypeTag::BlockHash, Selector::Number(number)) => self
                .facade
                .get_block_hash_by_number(number, location)
                .map(|hash| ResponseStatus::Found(Payload::BlockHash(hash)))
                .unwrap_or(ResponseStatus::NotFound),

            (tag, selector) => {
                warn!(?tag, ?selector, "illegal request selector for tag");
                return None;
            }
        };

        Some(ResponseFrame {
            id: frame.id,
            status,
        })
    }

    /// Decode, serve, and encode one framed request.
    ///
    /// Returns `None` when the frame should be skipped (malformed or
    /// illegal); the stream stays open either way.
    fn process(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let frame = match codec::decode_request(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "error decoding request frame");
                return None;
            }
        };

        debug!(
            id = frame.id,
            tag = frame.tag.as_str(),
            location = %frame.location,
            "received request"
        );

        let response = self.handle_request(frame)?;
        match codec::encode_response(response.id, response.status) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "error encoding response frame");
                None
            }
        }
    }
}

/// Handle for the inbound router task.
pub(crate) struct RouterHandle {
    shutdown_tx: mpsc::Sender<()>,
    join_handle: tokio::task::JoinHandle<()>,
}

impl RouterHandle {
    /// Stop accepting streams and wait for the router to exit.
    pub(crate) async fn close(self) -> Result<(), String> {
        let _ = self.shutdown_tx.send(()).await;
        self.join_handle
            .await
            .map_err(|e| format!("inbound router task failed: {}", e))
    }
}

/// Spawn the inbound router as a background task.
///
/// Accepts incoming lattice-protocol streams until shut down; each stream
/// gets its own task running the framed read loop.
pub(crate) fn spawn_inbound_router<F: NodeFacade>(
    mut control: stream::Control,
    facade: Arc<F>,
) -> RouterHandle {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

    let join_handle = tokio::spawn(async move {
        let handler = Arc::new(InboundHandler::new(facade));

        let mut incoming = match control.accept(PROTOCOL_VERSION) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(error = ?e, "failed to register stream protocol");
                return;
            }
        };

        debug!("inbound router accepting streams");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                next = incoming.next() => {
                    let Some((peer, stream)) = next else { break };
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handle_stream(handler, peer, stream).await;
                    });
                }
            }
        }

        debug!("inbound router shut down");
    });

    RouterHandle {
        shutdown_tx,
        join_handle,
    }
}

/// Run the framed request loop for one accepted stream.
///
/// Exits on clean end-of-stream, I/O failure, or deadline; the stream is
/// closed on every path. Malformed frames are skipped, not fatal.
async fn handle_stream<F: NodeFacade>(
    handler: Arc<InboundHandler<F>>,
    peer: PeerId,
    mut stream: Stream,
) {
    debug!(peer = %peer, "received a new stream");

    loop {
        let frame = match tokio::time::timeout(
            STREAM_IO_TIMEOUT,
            framing::read_frame(&mut stream, MAX_FRAME_SIZE),
        )
        .await
        {
            Err(_) => {
                debug!(peer = %peer, "stream idle past deadline");
                break;
            }
            Ok(Err(FrameError::Eof)) => {
                debug!(peer = %peer, "stream closed by peer");
                break;
            }
            Ok(Err(e)) => {
                // Frame boundary lost; the loop cannot continue safely.
                warn!(peer = %peer, error = %e, "error reading frame from stream");
                break;
            }
            Ok(Ok(bytes)) => bytes,
        };

        // Skipped frames (decode errors, illegal pairs) keep the loop alive.
        let Some(response) = handler.process(&frame) else {
            continue;
        };

        match tokio::time::timeout(
            STREAM_IO_TIMEOUT,
            framing::write_frame(&mut stream, &response),
        )
        .await
        {
            Err(_) => {
                debug!(peer = %peer, "response write past deadline");
                break;
            }
            Ok(Err(e)) => {
                warn!(peer = %peer, error = %e, "error writing response to stream");
                break;
            }
            Ok(Ok(())) => {}
        }
    }

    let _ = stream.close().await;
}
