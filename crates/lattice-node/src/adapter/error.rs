//! Adapter error types.

/// Errors from the swarm adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("network error: {0}")]
    Network(String),

    #[error("dial failed: {0}")]
    DialFailed(String),

    #[error("network shutdown")]
    Shutdown,

    #[error("stream open failed: {0}")]
    StreamOpenFailed(String),
}
