//! # Error handling utilities.
//! Typed failure taxonomy for the console session, built on thiserror
//! so callers can match on the exact failure kind.

use thiserror::Error;

/// Failures surfaced by the session, the dispatcher and the codec.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Discovery ended without a usable console, by timeout or cancellation.
    #[error("discovery aborted: {0}")]
    DiscoveryAborted(String),

    /// Connect, endpoint resolution or notify subscription failed.
    #[error("link setup failed: {0}")]
    LinkSetupFailed(String),

    /// The operation needs a connected console.
    #[error("not connected to a console")]
    NotConnected,

    /// The transport refused the write, typically mid teardown.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// A connect attempt while a console is already connected.
    #[error("already connected to a console")]
    AlreadyConnected,

    /// Caller-supplied parameters out of range, nothing was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Bytes that could not be decoded as a console message.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
