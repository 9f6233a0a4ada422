//! Peer transports.
//!
//! A transport has two paths to the companion: an immediate message that
//! only works while the peer is reachable, and a store-and-forward context
//! slot where the latest write wins.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::message::ContextPayload;
use crate::error::SyncError;

pub trait PeerTransport {
    /// Whether an immediate message would currently be delivered.
    fn is_reachable(&self) -> bool;

    fn send_message(&mut self, payload: &ContextPayload) -> Result<(), SyncError>;

    /// Replace the store-and-forward context.
    fn update_context(&mut self, payload: &ContextPayload) -> Result<(), SyncError>;
}

impl<T: PeerTransport + ?Sized> PeerTransport for Box<T> {
    fn is_reachable(&self) -> bool {
        (**self).is_reachable()
    }

    fn send_message(&mut self, payload: &ContextPayload) -> Result<(), SyncError> {
        (**self).send_message(payload)
    }

    fn update_context(&mut self, payload: &ContextPayload) -> Result<(), SyncError> {
        (**self).update_context(payload)
    }
}

/// No companion paired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl PeerTransport for NullTransport {
    fn is_reachable(&self) -> bool {
        false
    }

    fn send_message(&mut self, _payload: &ContextPayload) -> Result<(), SyncError> {
        Err(SyncError::PeerUnreachable)
    }

    fn update_context(&mut self, _payload: &ContextPayload) -> Result<(), SyncError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LoopbackInner {
    reachable: bool,
    messages: Vec<ContextPayload>,
    context: Option<ContextPayload>,
}

/// In-process transport. Clones share one mailbox, so a test or an embedded
/// mirror can hold a handle while the channel owns another.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    inner: Arc<Mutex<LoopbackInner>>,
}

impl LoopbackTransport {
    pub fn new(reachable: bool) -> Self {
        let transport = Self::default();
        transport.set_reachable(reachable);
        transport
    }

    pub fn set_reachable(&self, reachable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.reachable = reachable;
        }
    }

    /// Immediate messages delivered so far.
    pub fn messages(&self) -> Vec<ContextPayload> {
        self.inner
            .lock()
            .map(|inner| inner.messages.clone())
            .unwrap_or_default()
    }

    pub fn context(&self) -> Option<ContextPayload> {
        self.inner.lock().ok().and_then(|inner| inner.context.clone())
    }
}

impl PeerTransport for LoopbackTransport {
    fn is_reachable(&self) -> bool {
        self.inner.lock().map(|inner| inner.reachable).unwrap_or(false)
    }

    fn send_message(&mut self, payload: &ContextPayload) -> Result<(), SyncError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| SyncError::Transport("loopback mailbox poisoned".into()))?;
        if !inner.reachable {
            return Err(SyncError::PeerUnreachable);
        }
        inner.messages.push(payload.clone());
        Ok(())
    }

    fn update_context(&mut self, payload: &ContextPayload) -> Result<(), SyncError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| SyncError::Transport("loopback mailbox poisoned".into()))?;
        inner.context = Some(payload.clone());
        Ok(())
    }
}

const CONTEXT_FILE: &str = "context.json";

/// Context slot backed by a JSON file, for a mirror running as a separate
/// process on the same machine. Immediate messages are not supported.
#[derive(Debug, Clone)]
pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn context_path(&self) -> PathBuf {
        self.dir.join(CONTEXT_FILE)
    }

    /// The last context written, if any.
    pub fn read_context(&self) -> Result<Option<ContextPayload>, SyncError> {
        let path = self.context_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl PeerTransport for FileTransport {
    fn is_reachable(&self) -> bool {
        false
    }

    fn send_message(&mut self, _payload: &ContextPayload) -> Result<(), SyncError> {
        Err(SyncError::PeerUnreachable)
    }

    fn update_context(&mut self, payload: &ContextPayload) -> Result<(), SyncError> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!("{CONTEXT_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(payload)?)?;
        fs::rename(&tmp, self.context_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(sequence: u64) -> ContextPayload {
        ContextPayload {
            countdown_end_timestamp: 1_700_000_000.0,
            daily_remaining: 3,
            panic_remaining: 2,
            substance_label: "snus".into(),
            sequence,
            device_id: "urge-test".into(),
            sent_at: 1_699_999_000,
        }
    }

    #[test]
    fn loopback_refuses_messages_when_unreachable() {
        let mut transport = LoopbackTransport::new(false);
        assert!(matches!(
            transport.send_message(&payload(1)),
            Err(SyncError::PeerUnreachable)
        ));
        transport.update_context(&payload(1)).unwrap();
        assert_eq!(transport.context().map(|c| c.sequence), Some(1));
    }

    #[test]
    fn loopback_clones_share_mailbox() {
        let handle = LoopbackTransport::new(true);
        let mut owned = handle.clone();
        owned.send_message(&payload(5)).unwrap();
        assert_eq!(handle.messages().len(), 1);
    }

    #[test]
    fn file_context_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let mut transport = FileTransport::new(dir.path().join("companion"));
        assert!(transport.read_context().unwrap().is_none());

        transport.update_context(&payload(1)).unwrap();
        transport.update_context(&payload(2)).unwrap();
        assert_eq!(transport.read_context().unwrap().map(|c| c.sequence), Some(2));
    }
}
