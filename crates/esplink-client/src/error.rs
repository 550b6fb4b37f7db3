//! Client error types.

use esplink_protocol::{EncodeError, ProtocolError};
use thiserror::Error;

/// Errors surfaced by [`crate::Client`] operations.
///
/// Malformed inbound data never shows up here: bad frames are counted,
/// logged and dropped. Only transport failures and invalid outgoing requests
/// are reported.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport failed to read or write.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    Protocol(#[from] ProtocolError),
}

impl From<EncodeError> for ClientError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Protocol(e) => ClientError::Protocol(e),
            EncodeError::Io(e) => ClientError::Transport(e),
        }
    }
}

/// Every callback slot is taken.
///
/// Callers that get this back should not expect notifications for the
/// handler they tried to register.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("callback registry full ({capacity} slots)")]
pub struct RegistryFull {
    /// Number of slots in the registry.
    pub capacity: usize,
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
