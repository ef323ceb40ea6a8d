//! Byte channels the frame codec runs over
//!
//! The radio is reached through a duplex byte stream. Besides blocking
//! `Read`/`Write`, the codec needs a readiness check ([`bytes_to_read`]) so
//! that packet polling never blocks.
//!
//! [`bytes_to_read`]: CommunicationChannel::bytes_to_read

use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Abstraction for communication channels (Serial, TCP or in-memory)
pub trait CommunicationChannel: Read + Write + Send {
    /// Set timeout for blocking read/write operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any bytes received but not yet read
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Number of bytes that can be read without blocking
    fn bytes_to_read(&mut self) -> io::Result<u32>;
}

impl<C: CommunicationChannel + ?Sized> CommunicationChannel for Box<C> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        (**self).clear_input_buffer()
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        (**self).bytes_to_read()
    }
}

fn serial_to_io(e: serialport::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Serial port wrapper implementing CommunicationChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(serial_to_io)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(serial_to_io)
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(serial_to_io)
    }
}

/// TCP stream wrapper for radios exposed through a serial-to-network bridge
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Connect to a bridge at `addr` (e.g. "192.168.1.20:9750")
    pub fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl CommunicationChannel for TcpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        // Drain with a non-blocking read, then restore blocking mode
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 512];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        let result = self.stream.peek(&mut buf);
        self.stream.set_nonblocking(false)?;

        // A readable socket with nothing to peek means the bridge hung up
        match result {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "bridge closed the connection",
            )),
            Ok(n) => Ok(n as u32),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryBuffers {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

/// In-memory duplex channel
///
/// Bytes pushed through a [`MemoryChannel`] handle become readable by the
/// connection; everything the connection writes is captured for inspection.
/// Clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    buffers: Arc<Mutex<MemoryBuffers>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBuffers> {
        // A poisoned lock only means a test thread panicked mid-push
        match self.buffers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make `bytes` available to the reader
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.lock().inbound.extend(bytes.iter().copied());
    }

    /// Take everything written so far
    pub fn take_outbound(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().outbound)
    }

    /// Number of inbound bytes not yet consumed
    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Simulate the far end disconnecting
    pub fn close(&self) {
        self.lock().closed = true;
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut buffers = self.lock();
        if buffers.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"));
        }
        if buffers.inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(buffers.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(buffers.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffers = self.lock();
        if buffers.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"));
        }
        buffers.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for MemoryChannel {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.lock().inbound.clear();
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let buffers = self.lock();
        if buffers.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel closed"));
        }
        Ok(buffers.inbound.len() as u32)
    }
}
