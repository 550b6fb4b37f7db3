//! Inbound packet validation and parsing.
//!
//! ## Packet Format
//!
//! | Field   | Size (bytes) | Description                                        |
//! |---------|--------------|----------------------------------------------------|
//! | cmd     | 2            | Command or response code                           |
//! | argc    | 2            | Number of parameters that follow                   |
//! | value   | 4            | Request tag, return value or callback slot         |
//! | args    | variable     | `len:u16` + data + zero padding to 4, `argc` times |
//! | crc     | 2            | CRC over all preceding bytes                       |
//!
//! All integers are little-endian.

use bytes::Buf;

use crate::constants::*;
use crate::crc::crc16;
use crate::error::ProtocolError;
use crate::request::padding_for;

/// A validated packet, borrowing the frame buffer it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    /// Command or response code.
    pub command: u16,
    /// Number of wire parameters in `payload`.
    pub argc: u16,
    /// Return value, request tag or callback slot.
    pub value: u32,
    /// Parameter bytes between the header and the CRC.
    pub payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Parse the header of a frame without checking its CRC.
    ///
    /// `frame` is the unescaped frame including the two CRC bytes.
    pub fn parse(frame: &'a [u8]) -> Result<Self, ProtocolError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::FrameTooShort {
                expected: MIN_FRAME_LEN,
                actual: frame.len(),
            });
        }
        let mut header = &frame[..HEADER_LEN];
        let command = header.get_u16_le();
        let argc = header.get_u16_le();
        let value = header.get_u32_le();
        Ok(Packet {
            command,
            argc,
            value,
            payload: &frame[HEADER_LEN..frame.len() - CRC_LEN],
        })
    }

    /// Iterate over the packet's parameters.
    pub fn args(&self) -> Args<'a> {
        Args {
            remaining: self.payload,
            left: self.argc,
            argc: self.argc,
        }
    }

    /// Whether this is the module asking for a resynchronization.
    pub fn is_sync(&self) -> bool {
        self.command == CMD_SYNC
    }

    /// Whether this packet asks the host to run a callback.
    pub fn is_callback(&self) -> bool {
        self.command == CMD_RESP_CB
    }
}

/// How an inbound packet is to be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// The module restarted and wants a new handshake.
    Sync(Packet<'a>),
    /// Asynchronous notification for the callback in slot `value`.
    Callback(Packet<'a>),
    /// Anything else, including value responses. Handed to the caller.
    Reply(Packet<'a>),
}

impl<'a> Inbound<'a> {
    /// The packet, whatever its route.
    pub fn packet(&self) -> &Packet<'a> {
        match self {
            Inbound::Sync(p) | Inbound::Callback(p) | Inbound::Reply(p) => p,
        }
    }
}

/// Check the CRC trailer of a frame.
pub fn verify_crc(frame: &[u8]) -> Result<(), ProtocolError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(ProtocolError::FrameTooShort {
            expected: MIN_FRAME_LEN,
            actual: frame.len(),
        });
    }
    let (body, mut trailer) = frame.split_at(frame.len() - CRC_LEN);
    let computed = crc16(body);
    let received = trailer.get_u16_le();
    if computed != received {
        return Err(ProtocolError::ChecksumMismatch { computed, received });
    }
    Ok(())
}

/// Validate a candidate frame and classify it by command code.
pub fn decode_frame(frame: &[u8]) -> Result<Inbound<'_>, ProtocolError> {
    if let Err(err) = verify_crc(frame) {
        if !frame.is_empty() {
            log::debug!("rejected frame {}: {}", hex::encode(frame), err);
        }
        return Err(err);
    }
    let packet = Packet::parse(frame)?;
    log::trace!(
        "packet {} argc={} value=0x{:X} frame={}",
        command_name(packet.command),
        packet.argc,
        packet.value,
        hex::encode(frame)
    );
    Ok(match packet.command {
        CMD_SYNC => Inbound::Sync(packet),
        CMD_RESP_CB => Inbound::Callback(packet),
        _ => Inbound::Reply(packet),
    })
}

/// Iterator over the length-prefixed parameters of a packet.
///
/// Yields at most `argc` items. A parameter whose announced length runs past
/// the payload yields an error and ends the iteration.
#[derive(Debug, Clone)]
pub struct Args<'a> {
    remaining: &'a [u8],
    left: u16,
    argc: u16,
}

impl<'a> Args<'a> {
    /// Number of parameters not yet read.
    pub fn remaining(&self) -> u16 {
        self.left
    }

    /// Next parameter as raw bytes.
    pub fn next_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let argc = self.argc;
        self.next().unwrap_or(Err(ProtocolError::MissingArgument { argc }))
    }

    /// Next parameter as a UTF-8 string.
    pub fn next_str(&mut self) -> Result<&'a str, ProtocolError> {
        std::str::from_utf8(self.next_bytes()?).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Next parameter as a `u8`.
    pub fn next_u8(&mut self) -> Result<u8, ProtocolError> {
        let [b] = self.next_array::<1>()?;
        Ok(b)
    }

    /// Next parameter as a little-endian `u16`.
    pub fn next_u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.next_array()?))
    }

    /// Next parameter as a little-endian `u32`.
    pub fn next_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.next_array()?))
    }

    fn next_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let data = self.next_bytes()?;
        data.try_into().map_err(|_| ProtocolError::ArgumentSize {
            expected: N,
            actual: data.len(),
        })
    }
}

impl<'a> Iterator for Args<'a> {
    type Item = Result<&'a [u8], ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;

        if self.remaining.len() < 2 {
            let available = self.remaining.len();
            self.stop();
            return Some(Err(ProtocolError::TruncatedArgument {
                needed: 2,
                available,
            }));
        }
        let len = usize::from(self.remaining.get_u16_le());
        if self.remaining.len() < len {
            let available = self.remaining.len();
            self.stop();
            return Some(Err(ProtocolError::TruncatedArgument {
                needed: len,
                available,
            }));
        }
        let (data, rest) = self.remaining.split_at(len);
        // Trailing padding may be missing on the last parameter.
        let pad = padding_for(len).min(rest.len());
        self.remaining = &rest[pad..];
        Some(Ok(data))
    }
}

impl Args<'_> {
    fn stop(&mut self) {
        self.left = 0;
        self.remaining = &[];
    }
}
