//! # xbee-core
//!
//! Protocol layer for XBee mesh radio modules running in API mode.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Checksum-delimited frame encoding/decoding
//! - Local and remote AT commands with frame-id correlation
//! - Node discovery with an adaptive collection window
//! - IO sample decoding and pin configuration
//! - Non-blocking polling of received data packets
//!
//! ## Example
//!
//! ```rust,ignore
//! use xbee_core::prelude::*;
//!
//! let mut conn = Connection::new(ConnectionConfig::for_port("/dev/ttyUSB0"));
//! conn.connect()?;
//!
//! for node in conn.discover_nodes()? {
//!     println!("{:016X} {}", node.address, node.identifier);
//!     let reading = conn.read_pin(node.target(), 2)?;
//!     println!("  AD2 = {}", reading);
//! }
//!
//! for packet in conn.drain() {
//!     let packet = packet?;
//!     println!("{:016X}: {:?}", packet.source_address, packet.payload);
//! }
//! ```

pub mod io;
pub mod network;
pub mod protocol;
pub mod receive;

#[cfg(test)]
mod testutil;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::io::{IoPin, IoSample, PinMode};
    pub use crate::network::{DeviceType, DiscoveryControl, Node, NodeDirectory};
    pub use crate::protocol::{
        AtCode, AtCommand, AtResponse, CommandStatus, Connection, ConnectionConfig,
        ConnectionState, ErrorKind, ProtocolError, RemoteAtRequest, RemoteAtResponse, Target,
    };
    pub use crate::receive::Packet;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
