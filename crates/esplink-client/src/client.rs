//! The protocol client: request sending, frame assembly and packet routing.
//!
//! A [`Client`] owns one transport, one frame decoder and one callback
//! registry. Every operation runs to completion on the calling thread;
//! waiting for data is a bounded poll loop driven by [`Transport::idle`].
//!
//! Inbound packets fall into three groups:
//!
//! - `CMD_SYNC` from the module: the module restarted, so the handshake is
//!   redone on the spot. Never returned to the caller.
//! - `CMD_RESP_CB`: handed to the callback in the slot named by the value
//!   field. Never returned to the caller.
//! - Everything else: returned from [`Client::try_receive`] /
//!   [`Client::receive`].

use std::io::Write;

use esplink_protocol::{
    commands, decode_frame, escape_byte, write_request, Arg, Candidate, CommandSpec, FrameDecoder,
    Inbound, Packet, ProtocolError, CMD_RESP_V,
};
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::error::{ClientResult, RegistryFull};
use crate::registry::{Callback, CallbackRegistry, CallbackSlot};
use crate::transport::{Transport, TransportWriter};

// ============================================================================
// Statistics
// ============================================================================

/// Counters for everything the client has seen on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Requests written to the transport.
    pub requests_sent: u64,
    /// Frames that passed the CRC check.
    pub frames_accepted: u64,
    /// Non-empty frames shorter than a header plus CRC.
    pub short_frames: u64,
    /// Frames that did not fit the receive buffer.
    pub overflows: u64,
    /// Frames whose CRC did not match.
    pub checksum_errors: u64,
    /// Packets returned to the caller.
    pub replies: u64,
    /// Callback packets that reached a handler.
    pub callbacks_dispatched: u64,
    /// Callback packets naming an empty or unknown slot.
    pub callbacks_dropped: u64,
    /// Sync requests received from the module.
    pub resyncs: u64,
}

/// Where a completed frame went.
enum Route {
    /// A packet for the caller is sitting in the frame buffer.
    Caller,
    /// The module asked for a new handshake.
    Resync,
    /// Handled internally or dropped.
    Consumed,
}

// ============================================================================
// Client
// ============================================================================

/// Host side of the esp-link serial protocol.
///
/// Packets returned by [`Client::try_receive`] and [`Client::receive`]
/// borrow the client's frame buffer and must be consumed before the next
/// call.
pub struct Client<T: Transport> {
    transport: T,
    decoder: FrameDecoder,
    callbacks: CallbackRegistry,
    config: ClientConfig,
    synchronizing: bool,
    stats: ClientStats,
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .field("synchronizing", &self.synchronizing)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<T: Transport> Client<T> {
    /// Create a client with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a client with an explicit configuration.
    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Client {
            transport,
            decoder: FrameDecoder::new(),
            callbacks: CallbackRegistry::new(),
            config,
            synchronizing: false,
            stats: ClientStats::default(),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Wire counters.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// The registered callbacks.
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take the transport back.
    pub fn into_inner(self) -> T {
        self.transport
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send a request tagged with the configured request tag.
    pub fn execute(&mut self, spec: &CommandSpec, args: &[Arg<'_>]) -> ClientResult<()> {
        self.execute_with_value(spec, self.config.request_tag, args)
    }

    /// Send a request with an explicit value field.
    pub fn execute_with_value(
        &mut self,
        spec: &CommandSpec,
        value: u32,
        args: &[Arg<'_>],
    ) -> ClientResult<()> {
        write_request(TransportWriter(&mut self.transport), spec, value, args)?;
        self.stats.requests_sent += 1;
        debug!("sent {} value=0x{:X} ({} args)", spec.name, value, args.len());
        Ok(())
    }

    /// Write text outside any frame. The module prints it to its debug log.
    pub fn send_text(&mut self, text: &str) -> ClientResult<()> {
        let mut writer = TransportWriter(&mut self.transport);
        for &byte in text.as_bytes() {
            let (bytes, len) = escape_byte(byte);
            writer.write_all(&bytes[..len])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Discard unread input and any partial frame.
    pub fn clear_input(&mut self) -> ClientResult<()> {
        self.transport.clear_input()?;
        self.decoder.reset();
        Ok(())
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Register a notification handler.
    ///
    /// The returned slot is what the module must be given (see
    /// [`CallbackSlot::as_arg`]) for notifications to reach the handler.
    pub fn register_callback(
        &mut self,
        callback: impl Callback + 'static,
    ) -> Result<CallbackSlot, RegistryFull> {
        self.callbacks.register(callback)
    }

    /// Route a callback packet to its handler. Returns whether one ran.
    pub fn dispatch_callback(&mut self, packet: &Packet<'_>) -> bool {
        dispatch(&mut self.callbacks, &mut self.stats, packet)
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Process whatever bytes are available right now.
    ///
    /// Returns the first packet meant for the caller, or `None` if no such
    /// packet could be assembled from the bytes at hand.
    pub fn try_receive(&mut self) -> ClientResult<Option<Packet<'_>>> {
        let candidate = self.pump()?;
        Ok(candidate.and_then(|c| self.visible_packet(c)))
    }

    /// Wait up to the configured receive timeout for a packet.
    pub fn receive(&mut self) -> ClientResult<Option<Packet<'_>>> {
        self.receive_timeout(self.config.receive_timeout)
    }

    /// Wait up to `timeout` transport ticks for a packet.
    ///
    /// The timeout bounds the number of idle ticks, not wall-clock time.
    pub fn receive_timeout(&mut self, timeout: u32) -> ClientResult<Option<Packet<'_>>> {
        let mut budget = timeout;
        let candidate = loop {
            if let Some(candidate) = self.pump()? {
                break Some(candidate);
            }
            if budget == 0 {
                break None;
            }
            budget -= 1;
            self.transport.idle();
        };
        if candidate.is_none() {
            trace!("receive timed out after {} ticks", timeout);
        }
        Ok(candidate.and_then(|c| self.visible_packet(c)))
    }

    /// Run the sync handshake once.
    ///
    /// Sends `CMD_SYNC` and reads packets until a value response echoing the
    /// request tag arrives (`true`) or a receive times out (`false`). A sync
    /// started while another is in progress fails immediately.
    pub fn synchronize(&mut self) -> ClientResult<bool> {
        if self.synchronizing {
            debug!("sync already in progress");
            return Ok(false);
        }
        self.synchronizing = true;
        let result = self.sync_exchange();
        self.synchronizing = false;
        result
    }

    fn sync_exchange(&mut self) -> ClientResult<bool> {
        self.decoder.reset();
        let tag = self.config.request_tag;
        self.execute_with_value(&commands::SYNC, tag, &[])?;

        let timeout = self.config.sync_timeout;
        loop {
            let reply = self.receive_timeout(timeout)?.map(|p| (p.command, p.value));
            match reply {
                Some((CMD_RESP_V, value)) if value == tag => {
                    info!("synchronized with module");
                    return Ok(true);
                }
                Some((command, value)) => {
                    debug!("bogus sync reply: cmd={} value=0x{:X}", command, value);
                }
                None => {
                    warn!("no sync acknowledgement");
                    return Ok(false);
                }
            }
        }
    }

    /// Feed available bytes through the decoder until a caller-visible frame
    /// completes or the transport runs dry.
    fn pump(&mut self) -> ClientResult<Option<Candidate>> {
        while self.transport.available()? {
            let byte = self.transport.read_byte()?;
            let Some(candidate) = self.decoder.push(byte) else {
                continue;
            };
            match self.route(candidate) {
                Route::Caller => return Ok(Some(candidate)),
                Route::Resync => {
                    self.stats.resyncs += 1;
                    info!("module requested sync");
                    if !self.synchronize()? {
                        warn!("resync after module request failed");
                    }
                }
                Route::Consumed => {}
            }
        }
        Ok(None)
    }

    /// Validate and classify the frame the decoder just completed.
    fn route(&mut self, candidate: Candidate) -> Route {
        let frame = match self.decoder.candidate(candidate) {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.overflows += 1;
                warn!("dropping frame: {}", err);
                return Route::Consumed;
            }
        };

        match decode_frame(frame) {
            Ok(Inbound::Reply(packet)) => {
                self.stats.frames_accepted += 1;
                self.stats.replies += 1;
                trace!("reply cmd={} value=0x{:X}", packet.command, packet.value);
                Route::Caller
            }
            Ok(Inbound::Callback(packet)) => {
                self.stats.frames_accepted += 1;
                dispatch(&mut self.callbacks, &mut self.stats, &packet);
                Route::Consumed
            }
            Ok(Inbound::Sync(_)) => {
                self.stats.frames_accepted += 1;
                Route::Resync
            }
            // Back-to-back delimiters; every frame starts with one.
            Err(ProtocolError::FrameTooShort { actual: 0, .. }) => Route::Consumed,
            Err(err) => {
                if matches!(err, ProtocolError::ChecksumMismatch { .. }) {
                    self.stats.checksum_errors += 1;
                } else if err.is_framing() {
                    self.stats.short_frames += 1;
                }
                warn!("dropping frame {}: {}", hex::encode(frame), err);
                Route::Consumed
            }
        }
    }

    /// Re-read a frame that [`Client::route`] already accepted.
    fn visible_packet(&self, candidate: Candidate) -> Option<Packet<'_>> {
        self.decoder
            .candidate(candidate)
            .ok()
            .and_then(|frame| Packet::parse(frame).ok())
    }
}

/// Run the callback named by `packet` and count the outcome. Borrows only
/// the registry and the counters so it can run while the frame buffer is
/// still borrowed.
fn dispatch(
    callbacks: &mut CallbackRegistry,
    stats: &mut ClientStats,
    packet: &Packet<'_>,
) -> bool {
    let handled = callbacks.dispatch(packet);
    if handled {
        stats.callbacks_dispatched += 1;
    } else {
        stats.callbacks_dropped += 1;
        debug!("callback for empty slot {} dropped", packet.value);
    }
    handled
}
