//! Companion device link.
//!
//! The primary pushes full snapshots to a wrist companion over an unreliable
//! link and takes remote actions back. The companion is a read-mostly mirror:
//! every payload is complete, and the newest sequence wins.

mod channel;
pub mod device_id;
mod message;
mod mirror;
mod transport;

pub use channel::{CompanionSyncChannel, LinkState};
pub use device_id::{get_or_create_device_id, get_or_create_device_id_at};
pub use message::{ContextPayload, RemoteAction, RemoteReply, RemoteRequest, ReplyStatus};
pub use mirror::PeerMirror;
pub use transport::{FileTransport, LoopbackTransport, NullTransport, PeerTransport};
