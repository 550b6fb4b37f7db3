//! SLIP-style framing.
//!
//! Every frame on the wire is terminated by [`SLIP_END`]. Literal occurrences
//! of the delimiter or the escape marker inside a frame are replaced by a
//! two-byte escape sequence:
//!
//! ```text
//! 0xC0  ->  0xDB 0xDC
//! 0xDB  ->  0xDB 0xDD
//! ```
//!
//! Encoding is a per-byte operation so that requests can be streamed to the
//! transport without an intermediate buffer. Decoding runs one byte at a time
//! into a fixed-capacity buffer and needs no lookahead.

use crate::constants::*;
use crate::error::ProtocolError;

/// Escape a single raw byte.
///
/// Returns the on-wire bytes and how many of them are used (1 or 2).
pub fn escape_byte(byte: u8) -> ([u8; 2], usize) {
    match byte {
        SLIP_END => ([SLIP_ESC, SLIP_ESC_END], 2),
        SLIP_ESC => ([SLIP_ESC, SLIP_ESC_ESC], 2),
        other => ([other, 0], 1),
    }
}

/// Escape a run of bytes into `dest`, without delimiters.
pub fn escape_into(data: &[u8], dest: &mut Vec<u8>) {
    for &byte in data {
        let (bytes, len) = escape_byte(byte);
        dest.extend_from_slice(&bytes[..len]);
    }
}

/// Frame `data` for transmission: a leading delimiter to flush any line
/// noise on the receiving side, the escaped bytes, then the closing delimiter.
pub fn encode_frame(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() * 2 + 2);
    buf.push(SLIP_END);
    escape_into(data, &mut buf);
    buf.push(SLIP_END);
    buf
}

/// A completed candidate frame, reported when a delimiter arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Number of unescaped bytes seen since the previous delimiter. May exceed
    /// the buffer capacity, in which case only the first bytes were kept.
    pub len: usize,
}

impl Candidate {
    /// Whether the frame ran past the buffer.
    pub fn overflowed(&self) -> bool {
        self.len > FRAME_BUFFER_SIZE
    }
}

/// Incremental decoder for the incoming byte stream.
///
/// State is one escape flag plus the frame buffer and its write index. The
/// buffer is reused for every frame; the bytes of the most recent candidate
/// stay readable through [`FrameDecoder::candidate`] until the next
/// non-delimiter byte is pushed.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: [u8; FRAME_BUFFER_SIZE],
    /// Bytes seen in the current frame, including any that were discarded.
    index: usize,
    escaped: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with an empty buffer.
    pub fn new() -> Self {
        FrameDecoder {
            buffer: [0; FRAME_BUFFER_SIZE],
            index: 0,
            escaped: false,
        }
    }

    /// Consume one byte from the transport.
    ///
    /// Returns a [`Candidate`] when the byte was a delimiter. Zero-length
    /// candidates (back-to-back delimiters) are reported as well and are
    /// rejected downstream by the minimum length check.
    pub fn push(&mut self, byte: u8) -> Option<Candidate> {
        match byte {
            SLIP_ESC if !self.escaped => {
                self.escaped = true;
                None
            }
            SLIP_END => {
                let candidate = Candidate { len: self.index };
                self.index = 0;
                self.escaped = false;
                Some(candidate)
            }
            mut value => {
                if self.escaped {
                    value = match value {
                        SLIP_ESC_END => SLIP_END,
                        SLIP_ESC_ESC => SLIP_ESC,
                        other => other,
                    };
                    self.escaped = false;
                }
                match self.buffer.get_mut(self.index) {
                    Some(slot) => *slot = value,
                    None if self.index == FRAME_BUFFER_SIZE => {
                        log::warn!(
                            "frame exceeds {} bytes, discarding until next delimiter",
                            FRAME_BUFFER_SIZE
                        );
                    }
                    None => {}
                }
                self.index = self.index.saturating_add(1);
                None
            }
        }
    }

    /// The bytes of a candidate returned by [`FrameDecoder::push`].
    ///
    /// Fails with [`ProtocolError::FrameTooLong`] when the frame overflowed the
    /// buffer; such a frame is never handed out truncated.
    pub fn candidate(&self, candidate: Candidate) -> Result<&[u8], ProtocolError> {
        if candidate.overflowed() {
            return Err(ProtocolError::FrameTooLong {
                max: FRAME_BUFFER_SIZE,
                actual: candidate.len,
            });
        }
        Ok(&self.buffer[..candidate.len])
    }

    /// Number of bytes accumulated for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.index
    }

    /// Whether the last byte pushed was an escape marker.
    pub fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.index = 0;
        self.escaped = false;
    }
}
