//! Node discovery
//!
//! `ND` makes the firmware broadcast a discovery request; every reachable
//! node answers with one record, each arriving as a separate local AT
//! response carrying the ND frame id. Collection ends once no record has
//! arrived for the discovery timeout (`NT`). The window is re-armed on every
//! record, so a busy network is collected in full. A corrupted or malformed
//! record is dropped and collection continues with the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Node, NodeDirectory};
use crate::protocol::{
    AtCode, AtCommand, AtResponse, CommandStatus, Connection, ErrorKind, ProtocolError, Result,
};

/// Caller-side limits on a discovery run
#[derive(Debug, Clone, Default)]
pub struct DiscoveryControl {
    /// Stop collecting at this instant even if records are still arriving
    pub deadline: Option<Instant>,
    /// Stop collecting once this flag is set
    pub cancel: Option<Arc<AtomicBool>>,
}

impl DiscoveryControl {
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    pub fn with_cancel(cancel: Arc<AtomicBool>) -> Self {
        Self {
            deadline: None,
            cancel: Some(cancel),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl Connection {
    /// Discovery timeout advertised by the local radio
    ///
    /// `NT` answers in units of 100 ms. Only the second data byte is used;
    /// the first is treated as reserved.
    pub fn discovery_timeout(&mut self) -> Result<Duration> {
        let response = self.local_command(AtCode::NT)?;
        match response.data.get(1) {
            Some(&units) => Ok(Duration::from_millis(units as u64 * 100)),
            None => Err(ProtocolError::MalformedFrame(format!(
                "NT response with {} data bytes",
                response.data.len()
            ))),
        }
    }

    /// Discover reachable nodes, returned in arrival order
    pub fn discover_nodes(&mut self) -> Result<Vec<Node>> {
        self.discover_nodes_with(&DiscoveryControl::default())
    }

    /// Discover reachable nodes, honouring a deadline and cancellation flag
    pub fn discover_nodes_with(&mut self, control: &DiscoveryControl) -> Result<Vec<Node>> {
        let window = self.discovery_timeout()?;
        let deadline = match self.config().max_discovery_ms {
            Some(ms) => {
                let ceiling = Instant::now() + Duration::from_millis(ms);
                Some(control.deadline.map_or(ceiling, |d| d.min(ceiling)))
            }
            None => control.deadline,
        };

        let id = self.submit_local(&AtCommand::new(AtCode::ND))?;
        tracing::debug!("discovery started, window {}ms", window.as_millis());
        let result = self.collect_discovery(id, window, deadline, control);
        self.pending_release(id);

        let nodes = result?;
        tracing::debug!("discovery finished with {} nodes", nodes.len());
        Ok(nodes)
    }

    fn collect_discovery(
        &mut self,
        id: u8,
        window: Duration,
        deadline: Option<Instant>,
        control: &DiscoveryControl,
    ) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut last_response = Instant::now();

        loop {
            if control.is_cancelled() {
                tracing::debug!("discovery cancelled");
                break;
            }
            let window_end = last_response + window;
            let wait_until = deadline.map_or(window_end, |d| d.min(window_end));

            let payload = match self.wait_for_response(id, wait_until, control.cancel.as_deref()) {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) if e.kind() == ErrorKind::Checksum => {
                    // A corrupted frame costs one record, not the whole run
                    tracing::warn!("discarding corrupted frame during discovery: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            last_response = Instant::now();

            let response = match AtResponse::parse_local(&payload) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("discarding unparseable discovery response: {}", e);
                    continue;
                }
            };
            if response.status != CommandStatus::Ok {
                return Err(ProtocolError::AtStatus {
                    command: response.command,
                    status: response.status,
                });
            }
            if response.data.is_empty() {
                tracing::debug!("end-of-discovery marker received");
                break;
            }

            let node = match Node::parse_discovery(&response.data) {
                Ok(node) => node,
                Err(e) => {
                    tracing::warn!("discarding malformed discovery record: {}", e);
                    continue;
                }
            };
            tracing::debug!(
                "discovered {:016X} {:?} ({:?}), window re-armed",
                node.address,
                node.identifier,
                node.device_type
            );
            self.directory.upsert(node.clone());
            nodes.push(node);
        }

        Ok(nodes)
    }

    /// Cached node for `address`, created as a placeholder if unseen
    pub fn node(&mut self, address: u64) -> &Node {
        self.directory.get_or_create(address)
    }

    /// All nodes seen so far
    pub fn nodes(&self) -> &NodeDirectory {
        &self.directory
    }
}
