//! Incoming data packets
//!
//! Packets sent to this radio arrive as unsolicited receive frames (type
//! 0x80). They are pulled by the caller with [`Connection::poll_once`] or
//! [`Connection::drain`]; neither ever blocks waiting for new data, so the
//! caller decides how often to poll.

use byteorder::{BigEndian, ByteOrder};

use crate::protocol::{Connection, ProtocolError, Result, FRAME_RX_PACKET};

/// Option bit: packet was sent to the broadcast address
const OPTION_ADDRESS_BROADCAST: u8 = 0x02;
/// Option bit: packet was sent to the broadcast PAN
const OPTION_PAN_BROADCAST: u8 = 0x04;

/// A received data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub source_address: u64,
    /// Received signal strength, -dBm
    pub rssi: u8,
    pub pan_broadcast: bool,
    pub address_broadcast: bool,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Parse a receive frame payload
    pub fn parse(frame: &[u8]) -> Result<Self> {
        match frame.first() {
            Some(&FRAME_RX_PACKET) => {}
            Some(&actual) => {
                return Err(ProtocolError::FrameTypeMismatch {
                    expected: FRAME_RX_PACKET,
                    actual,
                })
            }
            None => return Err(ProtocolError::MalformedFrame("empty payload".to_string())),
        }
        if frame.len() < 11 {
            return Err(ProtocolError::MalformedFrame(format!(
                "receive frame of {} bytes",
                frame.len()
            )));
        }

        let options = frame[10];
        Ok(Self {
            source_address: BigEndian::read_u64(&frame[1..9]),
            rssi: frame[9],
            pan_broadcast: options & OPTION_PAN_BROADCAST != 0,
            address_broadcast: options & OPTION_ADDRESS_BROADCAST != 0,
            payload: frame[11..].to_vec(),
        })
    }
}

impl Connection {
    /// Next received packet, or `None` if nothing is pending
    pub fn poll_once(&mut self) -> Result<Option<Packet>> {
        match self.next_unsolicited()? {
            Some(frame) => Packet::parse(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Iterate over every packet currently pending
    ///
    /// The iterator ends when nothing more is pending or after a transport
    /// failure. Frame-level errors are yielded and iteration continues.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain {
            conn: self,
            done: false,
        }
    }
}

/// Iterator returned by [`Connection::drain`]
pub struct Drain<'a> {
    conn: &'a mut Connection,
    done: bool,
}

impl Iterator for Drain<'_> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.conn.poll_once() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                if e.is_fatal_to_stream() {
                    self.done = true;
                }
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Drain<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ConnectionConfig, MemoryChannel};
    use crate::testutil::{frame, rx_packet};
    use pretty_assertions::assert_eq;

    fn connection() -> (Connection, MemoryChannel) {
        let handle = MemoryChannel::new();
        let config = ConnectionConfig {
            timeout_ms: 50,
            poll_interval_ms: 1,
            ..ConnectionConfig::default()
        };
        (Connection::with_channel(Box::new(handle.clone()), config), handle)
    }

    #[test]
    fn test_parse_packet_options() {
        let bytes = rx_packet(0x0013_A200_40A1_B2C3, 0x28, 0x06, b"temp=21");
        let packet = Packet::parse(&bytes[3..bytes.len() - 1]).unwrap();
        assert_eq!(
            packet,
            Packet {
                source_address: 0x0013_A200_40A1_B2C3,
                rssi: 0x28,
                pan_broadcast: true,
                address_broadcast: true,
                payload: b"temp=21".to_vec(),
            }
        );

        let bytes = rx_packet(1, 0, 0x02, &[]);
        let packet = Packet::parse(&bytes[3..bytes.len() - 1]).unwrap();
        assert!(packet.address_broadcast);
        assert!(!packet.pan_broadcast);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_poll_once_nothing_pending() {
        let (mut conn, _handle) = connection();
        assert_eq!(conn.poll_once().unwrap(), None);
    }

    #[test]
    fn test_poll_once_wrong_frame_type() {
        let (mut conn, handle) = connection();
        handle.push_inbound(&frame(&[0x8A, 0x06]));
        assert!(matches!(
            conn.poll_once(),
            Err(ProtocolError::FrameTypeMismatch {
                expected: 0x80,
                actual: 0x8A
            })
        ));
    }

    #[test]
    fn test_drain_is_finite_and_restartable() {
        let (mut conn, handle) = connection();
        handle.push_inbound(&rx_packet(1, 10, 0, b"a"));
        handle.push_inbound(&rx_packet(2, 20, 0, b"b"));

        let sources: Vec<u64> = conn
            .drain()
            .map(|p| p.unwrap().source_address)
            .collect();
        assert_eq!(sources, vec![1, 2]);
        assert_eq!(conn.drain().count(), 0);

        handle.push_inbound(&rx_packet(3, 30, 0, b"c"));
        let again: Vec<Packet> = conn.drain().collect::<Result<_>>().unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].payload, b"c".to_vec());
    }

    #[test]
    fn test_drain_continues_after_bad_checksum() {
        let (mut conn, handle) = connection();
        let mut corrupt = rx_packet(1, 10, 0, b"x");
        *corrupt.last_mut().unwrap() ^= 0xFF;
        handle.push_inbound(&corrupt);
        handle.push_inbound(&rx_packet(2, 10, 0, b"y"));

        let results: Vec<Result<Packet>> = conn.drain().collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(ProtocolError::ChecksumMismatch { .. })));
        assert_eq!(results[1].as_ref().unwrap().source_address, 2);
    }

    #[test]
    fn test_drain_stops_on_transport_failure() {
        let (mut conn, handle) = connection();
        handle.close();
        let results: Vec<Result<Packet>> = conn.drain().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
