//! Connection management
//!
//! Owns the byte channel to the radio and executes AT commands over it.
//!
//! All methods take `&mut self`; a connection is driven from one context at
//! a time. Share it between threads behind a `Mutex` if needed. Several
//! commands may still be outstanding at once through
//! [`Connection::submit_local`] / [`Connection::await_local`], since responses
//! are correlated by frame id.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{
    commands::{AtCommand, AtResponse, RemoteAtRequest, RemoteAtResponse, Target},
    frame::{try_read_frame, Frame},
    pending::{FrameId, PendingRequests, RequestKind},
    serial::open_port,
    stream::{CommunicationChannel, SerialChannel},
    AtCode, ProtocolError, Result, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS, FRAME_AT_RESPONSE, FRAME_REMOTE_AT_RESPONSE,
};
use crate::network::NodeDirectory;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No channel attached
    Disconnected,
    /// Channel attached and usable
    Connected,
    /// Last connection attempt failed
    Error,
}

/// Connection configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Response timeout for a single command in milliseconds
    pub timeout_ms: u64,
    /// Period between readiness polls in milliseconds
    pub poll_interval_ms: u64,
    /// Upper bound on a whole discovery run in milliseconds
    pub max_discovery_ms: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_discovery_ms: None,
        }
    }
}

impl ConnectionConfig {
    /// Config for a port with all other settings at their defaults
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            ProtocolError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ProtocolError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Frames kept for the packet receiver before the oldest are dropped
pub const MAX_QUEUED_FRAMES: usize = 256;

/// Frame id of an AT response payload, if it is one
fn response_frame_id(payload: &[u8]) -> Option<FrameId> {
    match payload {
        [FRAME_AT_RESPONSE | FRAME_REMOTE_AT_RESPONSE, id, ..] => Some(*id),
        _ => None,
    }
}

/// Connection to a radio in API mode
pub struct Connection {
    channel: Option<Box<dyn CommunicationChannel>>,
    state: ConnectionState,
    config: ConnectionConfig,
    pending: PendingRequests,
    /// Frames read while waiting for responses, kept for the packet receiver
    unsolicited: VecDeque<Vec<u8>>,
    pub(crate) directory: NodeDirectory,
    tx_frames: u64,
    rx_frames: u64,
    tx_bytes: u64,
    rx_bytes: u64,
}

impl Connection {
    /// Create a new connection (not yet connected)
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            channel: None,
            state: ConnectionState::Disconnected,
            config,
            pending: PendingRequests::new(),
            unsolicited: VecDeque::new(),
            directory: NodeDirectory::new(),
            tx_frames: 0,
            rx_frames: 0,
            tx_bytes: 0,
            rx_bytes: 0,
        }
    }

    /// Create a connection over an already open channel
    ///
    /// The channel's blocking timeout is set to the response timeout.
    pub fn with_channel(
        mut channel: Box<dyn CommunicationChannel>,
        config: ConnectionConfig,
    ) -> Self {
        if let Err(e) = channel.set_timeout(config.response_timeout()) {
            tracing::warn!("could not set channel timeout: {}", e);
        }
        let mut conn = Self::new(config);
        conn.channel = Some(channel);
        conn.state = ConnectionState::Connected;
        conn
    }

    /// Open the configured serial port
    pub fn connect(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Ok(());
        }

        let port = match open_port(&self.config.port_name, Some(self.config.baud_rate)) {
            Ok(port) => port,
            Err(e) => {
                tracing::warn!("failed to open {}: {}", self.config.port_name, e);
                self.state = ConnectionState::Error;
                return Err(e);
            }
        };
        let mut channel = SerialChannel::new(port);
        channel.clear_input_buffer()?;

        tracing::debug!(
            "connected to {} at {} baud",
            self.config.port_name,
            self.config.baud_rate
        );
        self.channel = Some(Box::new(channel));
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Close the channel and forget in-flight requests
    pub fn disconnect(&mut self) {
        if self.channel.take().is_some() {
            tracing::debug!("disconnected");
        }
        self.pending = PendingRequests::new();
        self.unsolicited.clear();
        self.state = ConnectionState::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Cumulative (tx frames, rx frames, tx bytes, rx bytes)
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_frames, self.rx_frames, self.tx_bytes, self.rx_bytes)
    }

    /// Number of requests awaiting a response
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        frame.check_size()?;
        let channel = self.channel.as_mut().ok_or(ProtocolError::NotConnected)?;
        let bytes = frame.to_bytes();
        tracing::trace!("tx frame {:02x?}", frame.payload);

        channel.write_all(&bytes)?;
        channel.flush()?;

        self.tx_frames = self.tx_frames.saturating_add(1);
        self.tx_bytes = self.tx_bytes.saturating_add(bytes.len() as u64);
        Ok(())
    }

    /// Read at most one frame from the channel without blocking
    fn read_available_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let timeout = self.config.response_timeout();
        let poll = self.config.poll_interval();
        let channel = self.channel.as_mut().ok_or(ProtocolError::NotConnected)?;

        let frame = try_read_frame(&mut **channel, timeout, poll)?;
        if let Some(payload) = &frame {
            self.rx_frames = self.rx_frames.saturating_add(1);
            self.rx_bytes = self.rx_bytes.saturating_add(payload.len() as u64 + 4);
        }
        Ok(frame)
    }

    /// Hand a received payload to its pending request or the unsolicited queue
    ///
    /// The unsolicited queue holds at most [`MAX_QUEUED_FRAMES`]; callers that
    /// never poll for packets lose the oldest ones.
    fn route(&mut self, payload: Vec<u8>) {
        let Some(id) = response_frame_id(&payload) else {
            if self.unsolicited.len() >= MAX_QUEUED_FRAMES {
                self.unsolicited.pop_front();
                tracing::warn!(
                    "packet queue full ({} frames), dropping oldest",
                    MAX_QUEUED_FRAMES
                );
            }
            self.unsolicited.push_back(payload);
            return;
        };

        match self.pending.describe(id) {
            Some((command, kind)) if kind.response_type() != payload[0] => {
                tracing::warn!(
                    "dropping {:#04x} frame for frame id {}: {} is a {:?} request",
                    payload[0],
                    id,
                    command,
                    kind
                );
            }
            Some(_) => {
                self.pending.deliver(id, payload);
            }
            None => {
                tracing::warn!("dropping response for frame id {} with no pending request", id);
            }
        }
    }

    /// Next frame that is not a response to a pending request
    ///
    /// Queued frames come first, then at most one pass over what the channel
    /// currently has buffered. Never blocks waiting for new data.
    pub(crate) fn next_unsolicited(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(payload) = self.unsolicited.pop_front() {
                return Ok(Some(payload));
            }
            match self.read_available_frame()? {
                Some(payload) => self.route(payload),
                None => return Ok(None),
            }
        }
    }

    /// Poll until a response for `id` arrives, `deadline` passes or `cancel` is set
    pub(crate) fn wait_for_response(
        &mut self,
        id: FrameId,
        deadline: Instant,
        cancel: Option<&AtomicBool>,
    ) -> Result<Option<Vec<u8>>> {
        let poll = self.config.poll_interval();
        loop {
            if let Some(payload) = self.pending.take_response(id) {
                return Ok(Some(payload));
            }
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                tracing::debug!("wait for frame id {} cancelled", id);
                return Ok(None);
            }
            if let Some(payload) = self.read_available_frame()? {
                self.route(payload);
                continue;
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(poll);
        }
    }

    /// Release a frame id obtained through `submit_*` without awaiting it
    pub(crate) fn pending_release(&mut self, id: FrameId) {
        self.pending.complete(id);
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.channel.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        Ok(())
    }

    fn submit(
        &mut self,
        code: AtCode,
        kind: RequestKind,
        build: impl FnOnce(u8) -> Frame,
    ) -> Result<FrameId> {
        self.ensure_connected()?;
        let id = self.pending.register(code, kind)?;
        if let Err(e) = self.send_frame(&build(id)) {
            self.pending.complete(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Send a local AT command without waiting for its response
    pub fn submit_local(&mut self, command: &AtCommand) -> Result<FrameId> {
        self.submit(command.code, RequestKind::Local, |id| command.to_local_frame(id))
    }

    /// Send a remote AT command without waiting for its response
    pub fn submit_remote(&mut self, request: &RemoteAtRequest) -> Result<FrameId> {
        self.submit(request.command.code, RequestKind::Remote, |id| request.to_frame(id))
    }

    /// Wait for the raw response payload of `id`, releasing the id afterwards
    fn await_payload(&mut self, id: FrameId) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.config.response_timeout();
        let result = self.wait_for_response(id, deadline, None);
        self.pending.complete(id);
        match result? {
            Some(payload) => Ok(payload),
            None => {
                tracing::debug!("no response for frame id {}", id);
                Err(ProtocolError::Timeout)
            }
        }
    }

    /// Wait for the response to a submitted local command
    pub fn await_local(&mut self, id: FrameId) -> Result<AtResponse> {
        let payload = self.await_payload(id)?;
        AtResponse::parse_local(&payload)?.into_result()
    }

    /// Wait for the response to a submitted remote command
    pub fn await_remote(&mut self, id: FrameId) -> Result<RemoteAtResponse> {
        let payload = self.await_payload(id)?;
        RemoteAtResponse::parse(&payload)?.into_result()
    }

    /// Execute an AT command on the local radio
    ///
    /// A non-OK status is returned as [`ProtocolError::AtStatus`].
    pub fn local_command(&mut self, command: impl Into<AtCommand>) -> Result<AtResponse> {
        let command = command.into();
        let id = self.submit_local(&command)?;
        self.await_local(id)
    }

    /// Execute an AT command on a remote node, broadcast network address
    pub fn remote_command(
        &mut self,
        target_address: u64,
        command: impl Into<AtCommand>,
    ) -> Result<RemoteAtResponse> {
        self.remote_request(&RemoteAtRequest::new(target_address, command))
    }

    /// Execute a fully specified remote AT request
    pub fn remote_request(&mut self, request: &RemoteAtRequest) -> Result<RemoteAtResponse> {
        let id = self.submit_remote(request)?;
        self.await_remote(id)
    }

    /// Execute a command locally or remotely
    pub fn command(&mut self, target: Target, command: impl Into<AtCommand>) -> Result<AtResponse> {
        match target {
            Target::Local => self.local_command(command),
            Target::Remote(address) => self
                .remote_command(address, command)
                .map(|remote| remote.response),
        }
    }

    /// Identifier string of the local radio
    pub fn node_identifier(&mut self) -> Result<String> {
        let response = self.local_command(AtCode::NI)?;
        Ok(String::from_utf8_lossy(&response.data)
            .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string())
    }

    /// Apply queued configuration changes without a reset
    pub fn apply_changes(&mut self, target: Target) -> Result<()> {
        self.command(target, AtCode::AC).map(|_| ())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
