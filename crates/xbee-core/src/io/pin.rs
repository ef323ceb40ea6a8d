//! IO pins and their configuration commands

use serde::{Deserialize, Serialize};

use crate::protocol::{AtCode, ProtocolError, Result};

/// Highest addressable pin index
pub const MAX_PIN: u8 = 12;

/// One of the radio's configurable IO lines (0..=12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IoPin(u8);

impl IoPin {
    pub fn new(index: u8) -> Result<Self> {
        if index > MAX_PIN {
            return Err(ProtocolError::InvalidPin(index));
        }
        Ok(IoPin(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Command that reads or sets this pin's mode
    ///
    /// Pins 0-7 are `D0`..`D7`, pins 10-12 are `P0`..`P2`. Pins 8 and 9 have
    /// no mode command.
    pub fn mode_command(self) -> Result<AtCode> {
        match self.0 {
            n @ 0..=7 => Ok(AtCode::from_bytes([b'D', b'0' + n])),
            n @ 10..=12 => Ok(AtCode::from_bytes([b'P', b'0' + (n - 10)])),
            n => Err(ProtocolError::InvalidPin(n)),
        }
    }
}

impl TryFrom<u8> for IoPin {
    type Error = ProtocolError;

    fn try_from(index: u8) -> Result<Self> {
        IoPin::new(index)
    }
}

/// Pin mode as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinMode {
    Disabled,
    AnalogInput,
    DigitalInput,
    /// Outputs and special functions, by raw mode byte
    Other(u8),
}

impl PinMode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => PinMode::Disabled,
            0x02 => PinMode::AnalogInput,
            0x03 => PinMode::DigitalInput,
            other => PinMode::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PinMode::Disabled => 0x00,
            PinMode::AnalogInput => 0x02,
            PinMode::DigitalInput => 0x03,
            PinMode::Other(byte) => byte,
        }
    }
}
