//! AT commands
//!
//! Builds local and remote AT command request frames and parses the
//! corresponding response frames.
//!
//! Request layouts:
//! - local:  `0x08 | frame id | code(2) | args`
//! - remote: `0x17 | frame id | addr64 | addr16 | options | code(2) | args`
//!
//! Response layouts:
//! - local:  `0x88 | frame id | code(2) | status | data`
//! - remote: `0x97 | frame id | addr64 | addr16 | code(2) | status | data`

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    Frame, FrameBuilder, ProtocolError, Result, BROADCAST_NETWORK_ADDRESS, FRAME_AT_COMMAND,
    FRAME_AT_RESPONSE, FRAME_REMOTE_AT_COMMAND, FRAME_REMOTE_AT_RESPONSE,
};

/// Two-character AT command code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtCode([u8; 2]);

impl AtCode {
    /// Node identifier
    pub const NI: AtCode = AtCode(*b"NI");
    /// Node discovery timeout (units of 100 ms)
    pub const NT: AtCode = AtCode(*b"NT");
    /// Node discovery
    pub const ND: AtCode = AtCode(*b"ND");
    /// Force IO sample
    pub const IS: AtCode = AtCode(*b"IS");
    /// Apply pending configuration changes
    pub const AC: AtCode = AtCode(*b"AC");
    pub const D0: AtCode = AtCode(*b"D0");
    pub const D1: AtCode = AtCode(*b"D1");
    pub const D2: AtCode = AtCode(*b"D2");
    pub const D3: AtCode = AtCode(*b"D3");
    pub const D4: AtCode = AtCode(*b"D4");
    pub const D5: AtCode = AtCode(*b"D5");
    pub const D6: AtCode = AtCode(*b"D6");
    pub const D7: AtCode = AtCode(*b"D7");
    pub const P0: AtCode = AtCode(*b"P0");
    pub const P1: AtCode = AtCode(*b"P1");
    pub const P2: AtCode = AtCode(*b"P2");

    /// Parse a code such as "NI"
    pub fn new(code: &str) -> Result<Self> {
        match code.as_bytes() {
            [a, b] if a.is_ascii_graphic() && b.is_ascii_graphic() => Ok(AtCode([*a, *b])),
            _ => Err(ProtocolError::InvalidCommandCode(code.to_string())),
        }
    }

    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        AtCode(bytes)
    }

    pub fn as_bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for AtCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// An AT command with optional argument bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    pub code: AtCode,
    pub args: Vec<u8>,
}

impl AtCommand {
    /// A query (no arguments)
    pub fn new(code: AtCode) -> Self {
        Self {
            code,
            args: Vec::new(),
        }
    }

    /// A command carrying argument bytes
    pub fn with_args(code: AtCode, args: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            args: args.into(),
        }
    }

    /// Encode as a local AT command frame
    pub fn to_local_frame(&self, frame_id: u8) -> Frame {
        FrameBuilder::new(FRAME_AT_COMMAND)
            .byte(frame_id)
            .bytes(&self.code.as_bytes())
            .bytes(&self.args)
            .build()
    }
}

impl From<AtCode> for AtCommand {
    fn from(code: AtCode) -> Self {
        AtCommand::new(code)
    }
}

/// AT command status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    TxFailure,
}

impl CommandStatus {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(CommandStatus::Ok),
            0x01 => Ok(CommandStatus::Error),
            0x02 => Ok(CommandStatus::InvalidCommand),
            0x03 => Ok(CommandStatus::InvalidParameter),
            0x04 => Ok(CommandStatus::TxFailure),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            CommandStatus::Ok => 0x00,
            CommandStatus::Error => 0x01,
            CommandStatus::InvalidCommand => 0x02,
            CommandStatus::InvalidParameter => 0x03,
            CommandStatus::TxFailure => 0x04,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CommandStatus::Ok => "ok",
            CommandStatus::Error => "error",
            CommandStatus::InvalidCommand => "invalid command",
            CommandStatus::InvalidParameter => "invalid parameter",
            CommandStatus::TxFailure => "transmission failure",
        };
        f.write_str(text)
    }
}

/// Response to an AT command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResponse {
    /// Frame id the response was correlated by
    pub frame_id: u8,
    /// Echoed command code
    pub command: AtCode,
    pub status: CommandStatus,
    pub data: Vec<u8>,
}

impl AtResponse {
    /// Parse a local AT response payload (frame type 0x88)
    pub fn parse_local(payload: &[u8]) -> Result<Self> {
        expect_type(payload, FRAME_AT_RESPONSE)?;
        if payload.len() < 5 {
            return Err(ProtocolError::MalformedFrame(format!(
                "AT response of {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            frame_id: payload[1],
            command: AtCode::from_bytes([payload[2], payload[3]]),
            status: CommandStatus::from_byte(payload[4])?,
            data: payload[5..].to_vec(),
        })
    }

    /// Convert a non-OK status into the matching error
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            CommandStatus::Ok => Ok(self),
            status => Err(ProtocolError::AtStatus {
                command: self.command,
                status,
            }),
        }
    }
}

/// AT command addressed to a remote node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtRequest {
    pub command: AtCommand,
    /// 64-bit serial of the target node
    pub target_address: u64,
    /// 16-bit network address, 0xFFFE when unknown
    pub target_network_address: u16,
    pub options: u8,
}

impl RemoteAtRequest {
    /// Remote option bit: apply changes on the target immediately
    pub const OPTION_APPLY_CHANGES: u8 = 0x02;

    pub fn new(target_address: u64, command: impl Into<AtCommand>) -> Self {
        Self {
            command: command.into(),
            target_address,
            target_network_address: BROADCAST_NETWORK_ADDRESS,
            options: 0x00,
        }
    }

    pub fn network_address(mut self, address: u16) -> Self {
        self.target_network_address = address;
        self
    }

    pub fn options(mut self, options: u8) -> Self {
        self.options = options;
        self
    }

    /// Encode as a remote AT command frame
    pub fn to_frame(&self, frame_id: u8) -> Frame {
        FrameBuilder::new(FRAME_REMOTE_AT_COMMAND)
            .byte(frame_id)
            .u64_be(self.target_address)
            .u16_be(self.target_network_address)
            .byte(self.options)
            .bytes(&self.command.code.as_bytes())
            .bytes(&self.command.args)
            .build()
    }
}

/// Response to a remote AT command, with the identity of the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtResponse {
    pub source_address: u64,
    pub source_network_address: u16,
    pub response: AtResponse,
}

impl RemoteAtResponse {
    /// Parse a remote AT response payload (frame type 0x97)
    pub fn parse(payload: &[u8]) -> Result<Self> {
        expect_type(payload, FRAME_REMOTE_AT_RESPONSE)?;
        if payload.len() < 15 {
            return Err(ProtocolError::MalformedFrame(format!(
                "remote AT response of {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            source_address: BigEndian::read_u64(&payload[2..10]),
            source_network_address: BigEndian::read_u16(&payload[10..12]),
            response: AtResponse {
                frame_id: payload[1],
                command: AtCode::from_bytes([payload[12], payload[13]]),
                status: CommandStatus::from_byte(payload[14])?,
                data: payload[15..].to_vec(),
            },
        })
    }

    pub fn into_result(self) -> Result<Self> {
        let Self {
            source_address,
            source_network_address,
            response,
        } = self;
        Ok(Self {
            source_address,
            source_network_address,
            response: response.into_result()?,
        })
    }
}

/// Where a command is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The directly attached radio
    Local,
    /// A node reached through the mesh by its 64-bit serial
    Remote(u64),
}

fn expect_type(payload: &[u8], expected: u8) -> Result<()> {
    match payload.first() {
        Some(&actual) if actual == expected => Ok(()),
        Some(&actual) => Err(ProtocolError::FrameTypeMismatch { expected, actual }),
        None => Err(ProtocolError::MalformedFrame("empty payload".to_string())),
    }
}
