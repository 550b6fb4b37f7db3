//! esp-link Serial Protocol
//!
//! This crate provides the framing and packet codec for talking to an
//! esp-link WiFi bridge over a serial line. The bridge and the host exchange
//! SLIP-delimited frames, each carrying a small binary packet protected by a
//! 16-bit CRC.
//!
//! # Protocol Overview
//!
//! - **Requests** (host → module): a command code, a tag in the value field
//!   and zero or more length-prefixed parameters.
//! - **Value responses** (module → host): `CMD_RESP_V` with the result in the
//!   value field.
//! - **Callback responses** (module → host): `CMD_RESP_CB` with the slot of a
//!   host callback in the value field and the notification data as
//!   parameters.
//! - **Sync** (either direction): `CMD_SYNC` restarts the handshake.
//!
//! # Example
//!
//! ```rust
//! use esplink_protocol::{commands, decode_frame, encode_request, FrameDecoder, Inbound};
//!
//! // Build a request
//! let wire = encode_request(&commands::GET_TIME, 0x142, &[]).unwrap();
//! assert_eq!(wire.first(), Some(&0xC0));
//!
//! // Decode incoming bytes one at a time
//! let mut decoder = FrameDecoder::new();
//! for byte in wire {
//!     if let Some(candidate) = decoder.push(byte) {
//!         if let Ok(Ok(Inbound::Reply(packet))) = decoder.candidate(candidate).map(decode_frame) {
//!             assert_eq!(packet.value, 0x142);
//!         }
//!     }
//! }
//! ```

pub mod commands;
mod constants;
mod crc;
mod error;
mod frame;
mod packet;
mod request;

pub use commands::{CommandSpec, ParamKind, Returns};
pub use constants::*;
pub use crc::*;
pub use error::*;
pub use frame::*;
pub use packet::*;
pub use request::*;
