//! TCP transport.
//!
//! esp-link exposes the serial port it is attached to on a TCP port (23 by
//! default), so a host on the network can speak the same protocol a
//! microcontroller on the UART would.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::transport::Transport;

/// Default esp-link serial bridge port.
pub const DEFAULT_BRIDGE_PORT: u16 = 23;

const READ_CHUNK: usize = 256;

/// A [`Transport`] over a TCP connection to the esp-link serial bridge.
///
/// Reads are polled without blocking; one idle tick sleeps for the
/// configured tick length.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    tick: Duration,
}

impl TcpTransport {
    /// Connect to the bridge.
    pub fn connect(addr: impl ToSocketAddrs, tick: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!("connected to {}", stream.peer_addr()?);
        Ok(Self::from_stream(stream, tick))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, tick: Duration) -> Self {
        TcpTransport {
            stream,
            rx: VecDeque::with_capacity(READ_CHUNK),
            tx: Vec::with_capacity(READ_CHUNK),
            tick,
        }
    }

    /// Pull whatever the socket has without blocking. Returns the number of
    /// bytes read.
    fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        self.stream.set_nonblocking(true)?;
        let result = self.stream.read(&mut chunk);
        self.stream.set_nonblocking(false)?;
        match result {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "bridge closed the connection",
            )),
            Ok(n) => {
                trace!("rx {}", hex::encode(&chunk[..n]));
                self.rx.extend(&chunk[..n]);
                Ok(n)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

impl Transport for TcpTransport {
    fn available(&mut self) -> io::Result<bool> {
        if self.rx.is_empty() {
            self.fill()?;
        }
        Ok(!self.rx.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.rx
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "no byte available"))
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.tx.push(byte);
        if self.tx.len() >= READ_CHUNK {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.tx.is_empty() {
            trace!("tx {}", hex::encode(&self.tx));
            self.stream.write_all(&self.tx)?;
            self.tx.clear();
        }
        self.stream.flush()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        while self.fill()? > 0 {
            self.rx.clear();
        }
        Ok(())
    }

    fn idle(&mut self) {
        if self.tick.is_zero() {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(self.tick);
        }
    }
}
