//! API-mode protocol communication
//!
//! Implements the checksum-delimited frame format spoken by XBee modules in
//! API mode and the AT command request/response exchange built on top of it.
//!
//! Frame format:
//! - 1 byte: start delimiter (0x7E)
//! - 2 bytes: payload length (big-endian)
//! - N bytes: payload (first byte is the frame type)
//! - 1 byte: checksum (0xFF minus the low byte of the payload sum)

pub mod commands;
mod connection;
mod error;
mod frame;
mod pending;
pub mod serial;
pub mod stream;

pub use commands::{
    AtCode, AtCommand, AtResponse, CommandStatus, RemoteAtRequest, RemoteAtResponse, Target,
};
pub use connection::{Connection, ConnectionConfig, ConnectionState, MAX_QUEUED_FRAMES};
pub use error::{ErrorKind, ProtocolError, Result};
pub use frame::{checksum, read_frame, try_read_frame, Frame, FrameBuilder};
pub use pending::{FrameId, PendingRequests, RequestKind};
pub use serial::{configure_port, list_ports, open_port, PortInfo};
pub use stream::{CommunicationChannel, MemoryChannel, SerialChannel, TcpChannel};

/// Start-of-frame delimiter
pub const START_DELIMITER: u8 = 0x7E;

/// Largest payload the 16-bit length field can describe
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// Frame type: local AT command request
pub const FRAME_AT_COMMAND: u8 = 0x08;

/// Frame type: remote AT command request
pub const FRAME_REMOTE_AT_COMMAND: u8 = 0x17;

/// Frame type: receive packet indication (64-bit source address)
pub const FRAME_RX_PACKET: u8 = 0x80;

/// Frame type: local AT command response
pub const FRAME_AT_RESPONSE: u8 = 0x88;

/// Frame type: remote AT command response
pub const FRAME_REMOTE_AT_RESPONSE: u8 = 0x97;

/// 16-bit network address meaning "unknown / broadcast"
pub const BROADCAST_NETWORK_ADDRESS: u16 = 0xFFFE;

/// Factory default baud rate of the radio module
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for a single command response in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default period between transport readiness polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2;
