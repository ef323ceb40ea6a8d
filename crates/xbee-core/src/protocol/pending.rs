//! Request correlation
//!
//! Each outgoing AT command is tagged with a frame id drawn from a rotating
//! pool. Responses are matched back to their request by that id, which lets
//! several commands be outstanding on one connection at a time. Local AT
//! responses carry no sender identity, so the id is the only correlation key
//! for them.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use super::{AtCode, ProtocolError, Result, FRAME_AT_RESPONSE, FRAME_REMOTE_AT_RESPONSE};

/// Frame identifier of an outstanding request
pub type FrameId = u8;

/// Whether a request went to the local radio or through the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Local,
    Remote,
}

impl RequestKind {
    /// Frame type the radio answers this kind of request with
    pub fn response_type(self) -> u8 {
        match self {
            RequestKind::Local => FRAME_AT_RESPONSE,
            RequestKind::Remote => FRAME_REMOTE_AT_RESPONSE,
        }
    }
}

#[derive(Debug)]
struct PendingRequest {
    command: AtCode,
    kind: RequestKind,
    issued_at: Instant,
    responses: VecDeque<Vec<u8>>,
}

/// Pool of frame ids and the requests currently holding them
#[derive(Debug)]
pub struct PendingRequests {
    /// Next candidate id, never 0 (firmware suppresses the response for 0)
    next: FrameId,
    requests: HashMap<FrameId, PendingRequest>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next: 1,
            requests: HashMap::new(),
        }
    }

    /// Allocate a frame id for a new request
    pub fn register(&mut self, command: AtCode, kind: RequestKind) -> Result<FrameId> {
        for _ in 0..u8::MAX {
            let id = self.next;
            self.next = if self.next == u8::MAX { 1 } else { self.next + 1 };

            if !self.requests.contains_key(&id) {
                self.requests.insert(
                    id,
                    PendingRequest {
                        command,
                        kind,
                        issued_at: Instant::now(),
                        responses: VecDeque::new(),
                    },
                );
                tracing::debug!("frame id {} allocated for {} ({:?})", id, command, kind);
                return Ok(id);
            }
        }
        Err(ProtocolError::RequestPoolExhausted)
    }

    /// Command and kind a pending id was registered with
    pub fn describe(&self, id: FrameId) -> Option<(AtCode, RequestKind)> {
        self.requests.get(&id).map(|r| (r.command, r.kind))
    }

    /// Queue a response payload for its request; false if `id` is not pending
    pub fn deliver(&mut self, id: FrameId, payload: Vec<u8>) -> bool {
        match self.requests.get_mut(&id) {
            Some(request) => {
                tracing::debug!(
                    "response for frame id {} ({}) after {}ms",
                    id,
                    request.command,
                    request.issued_at.elapsed().as_millis()
                );
                request.responses.push_back(payload);
                true
            }
            None => false,
        }
    }

    /// Pop the oldest delivered response for `id`
    pub fn take_response(&mut self, id: FrameId) -> Option<Vec<u8>> {
        self.requests
            .get_mut(&id)
            .and_then(|r| r.responses.pop_front())
    }

    /// Release `id` back to the pool, dropping undelivered responses
    pub fn complete(&mut self, id: FrameId) {
        if let Some(request) = self.requests.remove(&id) {
            if !request.responses.is_empty() {
                tracing::warn!(
                    "frame id {} released with {} unread responses",
                    id,
                    request.responses.len()
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
