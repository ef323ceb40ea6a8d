//! Protocol errors

use thiserror::Error;

use super::commands::{AtCode, CommandStatus};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during communication with the radio
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Unexpected frame type: expected {expected:#04x}, got {actual:#04x}")]
    FrameTypeMismatch { expected: u8, actual: u8 },

    #[error("IO pin {0} is neither digital nor analog enabled")]
    PinDisabled(u8),

    #[error("Invalid IO pin index: {0}")]
    InvalidPin(u8),

    #[error("AT command {command} failed: {status}")]
    AtStatus {
        command: AtCode,
        status: CommandStatus,
    },

    #[error("Unknown AT command status byte: {0:#04x}")]
    UnknownStatus(u8),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid AT command code: {0:?}")]
    InvalidCommandCode(String),

    #[error("All frame identifiers are in use")]
    RequestPoolExhausted,

    #[error("Timed out waiting for response")]
    Timeout,

    #[error("Not connected to radio")]
    NotConnected,

    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`ProtocolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Frame failed checksum validation
    Checksum,
    /// A frame of a different type was found where one type was required
    FrameTypeMismatch,
    /// The queried IO pin is not sampling
    PinDisabled,
    /// The radio answered an AT command with a non-OK status
    AtStatus(CommandStatus),
    /// Truncated or otherwise unparseable frame contents
    Malformed,
    /// No response within the configured window
    Timeout,
    /// The underlying byte channel failed
    Transport,
    /// The caller supplied an argument the protocol cannot express
    Usage,
}

impl ProtocolError {
    /// Discriminant for matching on the error family
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::ChecksumMismatch { .. } => ErrorKind::Checksum,
            ProtocolError::FrameTypeMismatch { .. } => ErrorKind::FrameTypeMismatch,
            ProtocolError::PinDisabled(_) => ErrorKind::PinDisabled,
            ProtocolError::AtStatus { status, .. } => ErrorKind::AtStatus(*status),
            ProtocolError::UnknownStatus(_) | ProtocolError::MalformedFrame(_) => {
                ErrorKind::Malformed
            }
            ProtocolError::Timeout => ErrorKind::Timeout,
            ProtocolError::NotConnected
            | ProtocolError::SerialError(_)
            | ProtocolError::Io(_) => ErrorKind::Transport,
            ProtocolError::InvalidPin(_)
            | ProtocolError::InvalidCommandCode(_)
            | ProtocolError::RequestPoolExhausted
            | ProtocolError::Config(_) => ErrorKind::Usage,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::AtStatus(CommandStatus::TxFailure)
        )
    }

    /// Whether the error leaves the transport unusable for further reads
    pub(crate) fn is_fatal_to_stream(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Timeout)
    }
}
