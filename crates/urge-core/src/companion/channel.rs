use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::message::ContextPayload;
use super::transport::PeerTransport;
use crate::error::SyncError;
use crate::snapshot::Snapshot;

/// Link state. There is no terminal state: a dropped link reconnects when
/// the peer becomes reachable again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Primary-side end of the companion link.
///
/// Every outgoing payload takes the next sequence number, so the mirror can
/// drop anything that arrives out of order.
pub struct CompanionSyncChannel<T> {
    transport: T,
    state: LinkState,
    device_id: String,
    sequence: u64,
}

impl<T: PeerTransport> CompanionSyncChannel<T> {
    /// `sequence` is the last value used, as persisted by the owner.
    pub fn new(transport: T, device_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            transport,
            state: LinkState::Disconnected,
            device_id: device_id.into(),
            sequence,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Last sequence number handed out.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Never hand out a sequence at or below `used`, which another process
    /// sharing the device id may already have sent.
    pub fn skip_past(&mut self, used: u64) {
        self.sequence = self.sequence.max(used);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn activate(&mut self) {
        if self.state == LinkState::Disconnected {
            self.state = LinkState::Connecting;
            debug!("companion link activating");
        }
    }

    pub fn on_activation_complete(&mut self, ok: bool) {
        if self.state != LinkState::Connecting {
            return;
        }
        self.state = if ok && self.transport.is_reachable() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        debug!(state = ?self.state, "companion activation complete");
    }

    pub fn on_reachability_changed(&mut self, reachable: bool) {
        if self.state == LinkState::Connecting {
            return;
        }
        self.state = if reachable {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        debug!(state = ?self.state, "companion reachability changed");
    }

    fn next_payload(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> ContextPayload {
        self.sequence += 1;
        ContextPayload::from_snapshot(snapshot, self.sequence, &self.device_id, now)
    }

    /// Best-effort immediate push. Returns whether it was delivered; an
    /// unreachable peer is skipped without queueing or retrying.
    pub fn push_snapshot(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
        if self.state != LinkState::Connected || !self.transport.is_reachable() {
            debug!(state = ?self.state, "companion unreachable, snapshot skipped");
            return false;
        }
        let payload = self.next_payload(snapshot, now);
        match self.transport.send_message(&payload) {
            Ok(()) => {
                debug!(sequence = payload.sequence, "snapshot pushed");
                true
            }
            Err(e) => {
                warn!(error = %e, "snapshot push failed");
                false
            }
        }
    }

    /// Replace the companion's store-and-forward context.
    pub fn push_persistent_context(
        &mut self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
    ) -> Result<ContextPayload, SyncError> {
        let payload = self.next_payload(snapshot, now);
        self.transport.update_context(&payload)?;
        debug!(sequence = payload.sequence, "context updated");
        Ok(payload)
    }
}
