//! Byte transports.
//!
//! The client only needs four primitives from the serial link: "is a byte
//! waiting", "read that byte", "write a byte" and "throw away unread input".
//! [`Transport::idle`] is called once for every tick of a receive timeout
//! that passes without data.

use std::collections::VecDeque;
use std::io;

/// A byte-oriented serial link.
pub trait Transport {
    /// Whether at least one byte can be read without blocking.
    fn available(&mut self) -> io::Result<bool>;

    /// Read one byte. Only valid after [`Transport::available`] returned true.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Write one byte, blocking until the link accepts it.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Push any bytes the transport buffers on the way out.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Discard every byte currently waiting to be read.
    fn clear_input(&mut self) -> io::Result<()> {
        while self.available()? {
            self.read_byte()?;
        }
        Ok(())
    }

    /// Spend one timeout tick.
    fn idle(&mut self) {
        std::hint::spin_loop();
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn available(&mut self) -> io::Result<bool> {
        (**self).available()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }

    fn idle(&mut self) {
        (**self).idle()
    }
}

/// Adapts a [`Transport`] to [`std::io::Write`] so the request encoder can
/// stream into it byte by byte.
pub(crate) struct TransportWriter<'a, T: Transport>(pub(crate) &'a mut T);

impl<T: Transport> io::Write for TransportWriter<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.0.write_byte(byte)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Produces the module's reply to the bytes flushed by the host.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8>>;

/// In-memory transport.
///
/// Inbound bytes are queued with [`MemoryTransport::feed`]; outbound bytes
/// collect in a buffer. An optional responder plays the module: on every
/// flush it sees what the host wrote since the previous flush and its
/// return value is queued as inbound data.
#[derive(Default)]
pub struct MemoryTransport {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    unanswered: usize,
    responder: Option<Responder>,
    ticks: u64,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("rx", &self.rx.len())
            .field("tx", &self.tx.len())
            .field("responder", &self.responder.is_some())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl MemoryTransport {
    /// Create an empty transport with no responder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose peer answers every flush through `responder`.
    pub fn with_responder(responder: impl FnMut(&[u8]) -> Vec<u8> + 'static) -> Self {
        MemoryTransport {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    /// Queue bytes for the host to read.
    pub fn feed(&mut self, data: &[u8]) {
        self.rx.extend(data);
    }

    /// Everything the host has written so far.
    pub fn written(&self) -> &[u8] {
        &self.tx
    }

    /// Take and clear everything the host has written.
    pub fn take_written(&mut self) -> Vec<u8> {
        self.unanswered = 0;
        std::mem::take(&mut self.tx)
    }

    /// Number of unread inbound bytes.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Number of idle ticks spent by receive timeouts.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> io::Result<bool> {
        Ok(!self.rx.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.rx
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no byte available"))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.tx.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(&self.tx[self.unanswered..]);
            self.rx.extend(reply);
        }
        self.unanswered = self.tx.len();
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn idle(&mut self) {
        self.ticks += 1;
    }
}
