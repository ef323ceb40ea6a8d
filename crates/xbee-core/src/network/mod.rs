//! Mesh topology
//!
//! Node records, the address-keyed node cache and the discovery procedure
//! that fills it.

mod discovery;
mod node;

pub use discovery::DiscoveryControl;
pub use node::{DeviceType, Node, NodeDirectory};
