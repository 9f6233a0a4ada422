//! # Urge Core Library
//!
//! Core logic for Urge, a habit-moderation timer. The user enforces a
//! minimum wait between uses of a substance, within a daily allowance and a
//! smaller weekly "panic" allowance. The CLI binary and any GUI are thin
//! layers over this crate.
//!
//! ## Architecture
//!
//! - **Countdown**: the wait is stored as an absolute end instant; every read
//!   recomputes the remaining time from the wall clock
//! - **Allowances**: daily and weekly counts with calendar rollover
//! - **Storage**: a string key-value store (SQLite or in-memory) plus a usage
//!   log, and TOML configuration
//! - **Companion**: best-effort snapshots to a wrist companion, sequenced so
//!   the mirror can drop stale payloads
//!
//! ## Key Components
//!
//! - [`UrgeService`]: owns every component and implements the operations
//! - [`CountdownEngine`]: wait state machine
//! - [`AllowanceLedger`]: counts, limits and rollover
//! - [`Database`]: durable store
//! - [`Config`]: application configuration

pub mod allowance;
pub mod clock;
pub mod companion;
pub mod entitlement;
pub mod error;
pub mod events;
pub mod notify;
pub mod service;
pub mod snapshot;
pub mod stats;
pub mod storage;
pub mod substance;
pub mod ticker;
pub mod timer;

pub use allowance::{
    AllowanceConfig, AllowanceKind, AllowanceLedger, AllowanceState, OutOfAllowance,
    RolloverResult, WeekStart,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use companion::{
    CompanionSyncChannel, ContextPayload, FileTransport, LinkState, LoopbackTransport,
    NullTransport, PeerMirror, PeerTransport, RemoteAction, RemoteReply, RemoteRequest,
    ReplyStatus,
};
pub use entitlement::EntitlementOracle;
pub use error::{ConfigError, CoreError, StoreError, SyncError, ValidationError};
pub use events::Event;
pub use notify::{
    celebration_message, random_celebration, ExpiryNotice, NoopSink, NotificationSink,
    RecordingSink,
};
pub use service::UrgeService;
pub use snapshot::Snapshot;
pub use stats::{UsageKind, UsageRecord, UsageStats};
pub use storage::{Config, Database, MemoryStore, Store, UsageLog};
pub use substance::SubstanceProfile;
pub use ticker::{run_ticker, TickerConfig};
pub use timer::{CountdownEngine, Observation};
