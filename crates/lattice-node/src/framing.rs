//! Length-prefixed stream framing.
//!
//! Shared by the inbound router (server) and the peer requester (client)
//! so the wire protocol cannot drift between the two sides. Frame bodies
//! are the codec's compressed bytes; this layer only delimits them.
//!
//! # Wire format
//!
//! ```text
//! [4-byte big-endian length][frame body]
//! ```
//!
//! Unlike a one-shot exchange, a stream may carry many frames: writing a
//! frame flushes but does not close the stream. Closing is the caller's
//! responsibility.

use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io;

/// Maximum frame size, shared across inbound and outbound paths.
pub(crate) const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Errors from framing operations.
#[derive(Debug)]
pub(crate) enum FrameError {
    /// The peer closed the stream at a frame boundary.
    Eof,
    Io(io::Error),
    TooLarge(usize),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Eof => write!(f, "end of stream"),
            FrameError::Io(e) => write!(f, "frame I/O error: {}", e),
            FrameError::TooLarge(len) => write!(f, "frame too large: {} bytes", len),
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        FrameError::Io(e)
    }
}

/// Write `data` as one length-prefixed frame and flush.
pub(crate) async fn write_frame<S: AsyncWrite + Unpin>(
    stream: &mut S,
    data: &[u8],
) -> Result<(), io::Error> {
    let len = data.len() as u32;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// End-of-stream before the length prefix is a clean [`FrameError::Eof`];
/// everything else is an error.
pub(crate) async fn read_frame<S: AsyncRead + Unpin>(
    stream: &mut S,
    max_size: usize,
) -> Result<Vec<u8>, FrameError> {
    let mut len_bytes = [0u8; 4];
    if let Err(e) = stream.read_exact(&mut len_bytes).await {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Err(FrameError::Eof);
        }
        return Err(FrameError::Io(e));
    }
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > max_size {
        return Err(FrameError::TooLarge(len));
    }

    let mut data = vec![0u8; len];
    stream.read_exact(&mut data).await?;
    Ok(data)
}
