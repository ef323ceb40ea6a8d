//! Frame encoding/decoding
//!
//! Frame format:
//! - 1 byte: 0x7E start delimiter
//! - 2 bytes: payload length (big-endian)
//! - N bytes: payload
//! - 1 byte: checksum = 0xFF - (sum(payload) & 0xFF)
//!
//! A received frame is valid iff the payload sum plus the checksum byte has
//! a low byte of 0xFF.

use byteorder::{BigEndian, ByteOrder};
use std::time::{Duration, Instant};

use super::stream::CommunicationChannel;
use super::{ProtocolError, Result, MAX_FRAME_PAYLOAD, START_DELIMITER};

/// Checksum byte for a payload
pub fn checksum(payload: &[u8]) -> u8 {
    let sum = payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFF - sum
}

/// A protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload, starting with the frame type byte
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Frame type byte, if the payload is non-empty
    pub fn frame_type(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Fail if the payload does not fit the length field
    pub fn check_size(&self) -> Result<()> {
        if self.payload.len() > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::MalformedFrame(format!(
                "payload of {} bytes exceeds maximum of {}",
                self.payload.len(),
                MAX_FRAME_PAYLOAD
            )));
        }
        Ok(())
    }

    /// Encode the frame to wire bytes
    ///
    /// The payload must satisfy [`Frame::check_size`]; longer payloads do not
    /// round-trip.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.push(START_DELIMITER);

        let mut len_bytes = [0u8; 2];
        BigEndian::write_u16(&mut len_bytes, self.payload.len() as u16);
        bytes.extend_from_slice(&len_bytes);

        bytes.extend_from_slice(&self.payload);
        bytes.push(checksum(&self.payload));
        bytes
    }

    /// Decode one frame from a complete byte buffer
    ///
    /// Bytes ahead of the start delimiter are skipped.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let start = data
            .iter()
            .position(|b| *b == START_DELIMITER)
            .ok_or_else(|| ProtocolError::MalformedFrame("no start delimiter".to_string()))?;
        let data = &data[start + 1..];

        if data.len() < 2 {
            return Err(ProtocolError::MalformedFrame("missing length".to_string()));
        }
        let length = BigEndian::read_u16(&data[0..2]) as usize;
        if data.len() < 2 + length + 1 {
            return Err(ProtocolError::MalformedFrame(format!(
                "length {} exceeds {} available bytes",
                length,
                data.len().saturating_sub(3)
            )));
        }

        let payload = data[2..2 + length].to_vec();
        verify(&payload, data[2 + length])?;
        Ok(Self { payload })
    }

    /// Total encoded size (delimiter + length + payload + checksum)
    pub fn encoded_size(&self) -> usize {
        1 + 2 + self.payload.len() + 1
    }
}

fn verify(payload: &[u8], received: u8) -> Result<()> {
    let total = payload
        .iter()
        .fold(received, |acc, b| acc.wrapping_add(*b));
    if total != 0xFF {
        return Err(ProtocolError::ChecksumMismatch {
            expected: checksum(payload),
            actual: received,
        });
    }
    Ok(())
}

/// Builder for frame payloads
pub struct FrameBuilder {
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Start a payload with the given frame type byte
    pub fn new(frame_type: u8) -> Self {
        Self {
            payload: vec![frame_type],
        }
    }

    /// Add a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Add a 16-bit value (big-endian)
    pub fn u16_be(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add a 64-bit value (big-endian)
    pub fn u64_be(mut self, value: u64) -> Self {
        let mut bytes = [0u8; 8];
        BigEndian::write_u64(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Frame {
        Frame::new(self.payload)
    }
}

/// Read exactly `buf.len()` bytes, polling `bytes_to_read()` until `deadline`
fn read_exact_until<C: CommunicationChannel + ?Sized>(
    channel: &mut C,
    buf: &mut [u8],
    deadline: Instant,
    poll: Duration,
) -> Result<()> {
    let mut offset = 0;

    while offset < buf.len() {
        let available = channel.bytes_to_read()? as usize;
        if available == 0 {
            if Instant::now() >= deadline {
                tracing::debug!(
                    "read timed out after {} of {} bytes",
                    offset,
                    buf.len()
                );
                return Err(ProtocolError::Timeout);
            }
            std::thread::sleep(poll);
            continue;
        }

        let to_read = available.min(buf.len() - offset);
        match channel.read(&mut buf[offset..offset + to_read]) {
            Ok(0) => {
                return Err(ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "channel closed mid-frame",
                )))
            }
            Ok(n) => offset += n,
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read length, payload and checksum once the start delimiter is consumed
fn read_frame_body<C: CommunicationChannel + ?Sized>(
    channel: &mut C,
    deadline: Instant,
    poll: Duration,
) -> Result<Vec<u8>> {
    let mut header = [0u8; 2];
    read_exact_until(channel, &mut header, deadline, poll)?;
    let length = BigEndian::read_u16(&header) as usize;

    // Payload and checksum in one read
    let mut body = vec![0u8; length + 1];
    read_exact_until(channel, &mut body, deadline, poll)?;
    let received = body.pop().unwrap_or_default();

    if let Err(e) = verify(&body, received) {
        tracing::warn!("dropping frame of {} bytes: {}", length, e);
        return Err(e);
    }
    tracing::trace!("rx frame {:02x?}", body);
    Ok(body)
}

/// Blocking decode of the next frame
///
/// Every byte ahead of the start delimiter is consumed and discarded. Fails
/// with [`ProtocolError::Timeout`] if no complete frame arrives within
/// `timeout`.
pub fn read_frame<C: CommunicationChannel + ?Sized>(
    channel: &mut C,
    timeout: Duration,
    poll: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut byte = [0u8; 1];
    let mut discarded = 0usize;

    loop {
        read_exact_until(channel, &mut byte, deadline, poll)?;
        if byte[0] == START_DELIMITER {
            break;
        }
        discarded += 1;
        tracing::trace!("discarding junk byte {:#04x} before start delimiter", byte[0]);
    }
    if discarded > 0 {
        tracing::debug!("resynchronized after {} junk bytes", discarded);
    }

    read_frame_body(channel, deadline, poll)
}

/// Non-blocking decode of the next frame
///
/// Returns `Ok(None)` when no start delimiter is currently available; junk
/// bytes available ahead of it are consumed. Once a delimiter is found the
/// rest of the frame is read with the same `timeout` as [`read_frame`].
pub fn try_read_frame<C: CommunicationChannel + ?Sized>(
    channel: &mut C,
    timeout: Duration,
    poll: Duration,
) -> Result<Option<Vec<u8>>> {
    let mut byte = [0u8; 1];
    loop {
        if channel.bytes_to_read()? == 0 {
            return Ok(None);
        }
        match channel.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) if byte[0] == START_DELIMITER => break,
            Ok(_) => {
                tracing::trace!("discarding junk byte {:#04x} before start delimiter", byte[0]);
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        }
    }

    read_frame_body(channel, Instant::now() + timeout, poll).map(Some)
}
