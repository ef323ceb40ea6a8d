//! Node records and the directory that caches them

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::protocol::{ProtocolError, Result, Target, BROADCAST_NETWORK_ADDRESS};

/// Role of a node in the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
}

impl DeviceType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(DeviceType::Coordinator),
            1 => Some(DeviceType::Router),
            2 => Some(DeviceType::EndDevice),
            _ => None,
        }
    }
}

/// A mesh participant, keyed by its 64-bit serial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: u64,
    pub network_address: u16,
    pub identifier: String,
    /// Parent's network address; `None` for the coordinator or when unknown
    pub parent_address: Option<u16>,
    /// `None` for placeholders and unrecognised type bytes
    pub device_type: Option<DeviceType>,
    pub profile_id: u16,
    pub mfg_id: u16,
}

impl Node {
    /// A node known only by address
    pub fn placeholder(address: u64) -> Self {
        Self {
            address,
            network_address: BROADCAST_NETWORK_ADDRESS,
            identifier: String::new(),
            parent_address: None,
            device_type: None,
            profile_id: 0,
            mfg_id: 0,
        }
    }

    /// Remote-AT target for commands to this node
    pub fn target(&self) -> Target {
        Target::Remote(self.address)
    }

    /// Parse one discovery record (the data of an ND response)
    ///
    /// Layout: network address (2), serial (8), NUL-terminated identifier,
    /// parent network address (2), device type (1), status (1, ignored),
    /// profile id (2), manufacturer id (2).
    pub fn parse_discovery(data: &[u8]) -> Result<Self> {
        let truncated = |field: &str| {
            ProtocolError::MalformedFrame(format!(
                "discovery record of {} bytes ends before {}",
                data.len(),
                field
            ))
        };

        if data.len() < 10 {
            return Err(truncated("address"));
        }
        let network_address = BigEndian::read_u16(&data[0..2]);
        let address = BigEndian::read_u64(&data[2..10]);

        let rest = &data[10..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| truncated("identifier terminator"))?;
        let identifier = String::from_utf8_lossy(&rest[..nul]).into_owned();

        let tail = &rest[nul + 1..];
        if tail.len() < 8 {
            return Err(truncated("trailer"));
        }
        let parent = BigEndian::read_u16(&tail[0..2]);

        Ok(Self {
            address,
            network_address,
            identifier,
            parent_address: (parent != BROADCAST_NETWORK_ADDRESS).then_some(parent),
            device_type: DeviceType::from_byte(tail[2]),
            profile_id: BigEndian::read_u16(&tail[4..6]),
            mfg_id: BigEndian::read_u16(&tail[6..8]),
        })
    }
}

/// Cache of known nodes by 64-bit address
#[derive(Debug, Default)]
pub struct NodeDirectory {
    nodes: HashMap<u64, Node>,
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached node for `address`, inserting a placeholder if unseen
    pub fn get_or_create(&mut self, address: u64) -> &Node {
        self.nodes
            .entry(address)
            .or_insert_with(|| Node::placeholder(address))
    }

    pub fn get(&self, address: u64) -> Option<&Node> {
        self.nodes.get(&address)
    }

    /// Insert or replace the record for `node.address`
    pub fn upsert(&mut self, node: Node) {
        if let Some(previous) = self.nodes.insert(node.address, node) {
            tracing::trace!("updated node {:016X}", previous.address);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
