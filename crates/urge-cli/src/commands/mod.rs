pub mod config;
pub mod day;
pub mod peer;
pub mod profile;
pub mod run;
pub mod stats;
pub mod timer;

use serde::Serialize;
use urge_core::companion::get_or_create_device_id_at;
use urge_core::storage::{data_dir, NotificationsConfig};
use urge_core::{
    random_celebration, Config, Database, ExpiryNotice, FileTransport, NotificationSink,
    NullTransport, PeerTransport, Snapshot, SystemClock, UrgeService,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub type CliService = UrgeService<Database, SystemClock, Box<dyn PeerTransport>>;

/// Prints expiry notices to stderr.
pub struct TerminalSink {
    config: NotificationsConfig,
}

impl NotificationSink for TerminalSink {
    fn countdown_expired(&self, notice: &ExpiryNotice) {
        if !self.config.enabled {
            return;
        }
        let bell = if self.config.haptics { "\x07" } else { "" };
        eprintln!("{bell}{}", random_celebration(notice.substance));
    }

    fn allowance_changed(&self, snapshot: &Snapshot) {
        tracing::debug!(
            daily = snapshot.daily_remaining,
            panic = snapshot.weekly_panic_remaining,
            "allowance changed"
        );
    }
}

/// Companion context files live here.
pub fn companion_dir() -> Result<std::path::PathBuf, std::io::Error> {
    Ok(data_dir()?.join("companion"))
}

/// Build the service over the on-disk database and bring it up to date.
pub fn open_service(config: &Config) -> Result<CliService, Box<dyn std::error::Error>> {
    let dir = data_dir()?;
    let device_id = get_or_create_device_id_at(&dir)?;
    let transport: Box<dyn PeerTransport> = if config.companion.enabled {
        Box::new(FileTransport::new(companion_dir()?))
    } else {
        Box::new(NullTransport)
    };
    let sink = TerminalSink {
        config: config.notifications.clone(),
    };

    let mut service = UrgeService::new(
        Database::open()?,
        SystemClock,
        sink,
        config.premium.unlocked,
        transport,
        device_id,
    )?
    .with_week_start(config.calendar.week_start);
    service.resume()?;
    Ok(service)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Events queued by the command, then the resulting state.
pub fn print_outcome(service: &mut CliService) -> CliResult {
    let events = service.drain_events();
    print_json(&serde_json::json!({
        "events": events,
        "snapshot": service.snapshot(),
    }))
}
