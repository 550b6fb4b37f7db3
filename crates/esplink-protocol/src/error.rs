//! Protocol error types.

use thiserror::Error;

use crate::commands::ParamKind;

/// Errors that can occur when working with the esp-link protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is too short to hold a header and CRC.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame did not fit the receive buffer.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Buffer capacity.
        max: usize,
        /// Number of bytes seen before the delimiter.
        actual: usize,
    },

    /// CRC trailer did not match the frame contents.
    #[error("checksum mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        /// CRC computed over the frame.
        computed: u16,
        /// CRC carried in the trailer.
        received: u16,
    },

    /// Wrong number of arguments for a command.
    #[error("{command}: expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Command name.
        command: &'static str,
        /// Number of parameters in the descriptor.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// Argument does not match the parameter kind of the descriptor.
    #[error("{command}: argument {index} does not match parameter kind {expected:?}")]
    ArgumentKind {
        /// Command name.
        command: &'static str,
        /// Zero-based argument position.
        index: usize,
        /// Kind the descriptor asks for.
        expected: ParamKind,
    },

    /// Argument bytes do not fit a u16 length prefix.
    #[error("argument too long: {0} bytes")]
    ArgumentTooLong(usize),

    /// Parameter count does not fit the u16 argc field.
    #[error("too many arguments: {0}")]
    TooManyArguments(usize),

    /// Every argument announced by argc has already been read.
    #[error("missing argument: all {argc} arguments already read")]
    MissingArgument {
        /// Argument count carried in the header.
        argc: u16,
    },

    /// Argument list in a received packet ended early.
    #[error("truncated argument: need {needed} bytes, {available} available")]
    TruncatedArgument {
        /// Bytes the length prefix announced.
        needed: usize,
        /// Bytes remaining in the packet.
        available: usize,
    },

    /// Argument has the wrong size for the requested scalar.
    #[error("argument size mismatch: expected {expected} bytes, got {actual}")]
    ArgumentSize {
        /// Size of the scalar.
        expected: usize,
        /// Size carried on the wire.
        actual: usize,
    },

    /// UTF-8 decoding error.
    #[error("invalid UTF-8 in string argument")]
    InvalidUtf8,
}

/// Errors from writing a request to a byte sink.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The request itself is invalid.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The sink failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error came from a malformed inbound frame, as opposed to
    /// a request the caller built incorrectly.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::FrameTooShort { .. }
                | ProtocolError::FrameTooLong { .. }
                | ProtocolError::ChecksumMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::ChecksumMismatch {
            computed: 0x7E72,
            received: 0x0001,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: computed 0x7E72, received 0x0001"
        );

        let err = ProtocolError::FrameTooShort {
            expected: 10,
            actual: 3,
        };
        assert!(err.to_string().contains("at least 10"));
    }

    #[test]
    fn test_is_framing() {
        assert!(ProtocolError::FrameTooLong { max: 128, actual: 200 }.is_framing());
        assert!(!ProtocolError::ArgumentTooLong(70000).is_framing());
        assert!(!ProtocolError::MissingArgument { argc: 0 }.is_framing());
    }

    #[test]
    fn test_count_errors_display() {
        assert_eq!(
            ProtocolError::TooManyArguments(65_536).to_string(),
            "too many arguments: 65536"
        );
        assert_eq!(
            ProtocolError::MissingArgument { argc: 2 }.to_string(),
            "missing argument: all 2 arguments already read"
        );
    }
}
