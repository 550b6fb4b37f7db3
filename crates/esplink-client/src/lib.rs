//! esp-link Client
//!
//! This crate drives the esp-link serial protocol from the host side. It
//! pairs the codec in `esplink-protocol` with a byte transport and a
//! fixed-size callback table:
//!
//! - [`Transport`]: the four serial primitives the protocol needs, with an
//!   in-memory implementation for tests and a TCP implementation for the
//!   esp-link network bridge.
//! - [`CallbackRegistry`]: routes `CMD_RESP_CB` notifications to handlers.
//! - [`Client`]: sends requests, assembles inbound frames one byte at a time
//!   and routes each packet to the caller, a callback, or the sync handshake.
//!
//! # Example
//!
//! ```rust
//! use esplink_client::{Client, MemoryTransport};
//! use esplink_protocol::{commands, encode_packet, CMD_RESP_V};
//!
//! let mut client = Client::new(MemoryTransport::new());
//! client.execute(&commands::GET_TIME, &[]).unwrap();
//!
//! // The module answers with the current time in the value field.
//! let reply = encode_packet(CMD_RESP_V, 1_500_000_000, &[]).unwrap();
//! client.transport_mut().feed(&reply);
//!
//! let packet = client.try_receive().unwrap().expect("reply");
//! assert_eq!(packet.value, 1_500_000_000);
//! ```

mod client;
mod config;
mod error;
mod registry;
mod tcp;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use registry::*;
pub use tcp::*;
pub use transport::{MemoryTransport, Responder, Transport};
