mod config;
pub mod database;
pub mod keys;
mod memory;

pub use config::{
    CalendarConfig, CompanionConfig, Config, DefaultsConfig, NotificationsConfig, PremiumConfig,
    TicksConfig, hours_to_secs,
};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::stats::UsageRecord;

/// Returns `~/.config/urge[-dev]/` based on URGE_ENV.
///
/// Set URGE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("URGE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("urge-dev")
    } else {
        base_dir.join("urge")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// One pending write: `Some` sets the key, `None` removes it.
pub type Write<'a> = (&'a str, Option<String>);

/// Durable key-value storage shared by the app and its companion processes.
///
/// Values are strings; the typed helpers below fix the encoding (decimal
/// numbers, `true`/`false`, RFC 3339 timestamps).
pub trait Store {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Apply every write or none of them.
    fn apply(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.apply(&[(key, Some(value.to_string()))])
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.apply(&[(key, None)])
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        parse_value(key, self.get(key)?)
    }

    fn get_u64(&self, key: &str) -> Result<Option<u64>, StoreError> {
        parse_value(key, self.get(key)?)
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        parse_value(key, self.get(key)?)
    }

    /// Seconds stored as a (possibly fractional) decimal.
    fn get_seconds(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(parse_value::<f64>(key, self.get(key)?)?.map(|secs| secs.max(0.0).round() as u64))
    }

    fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| StoreError::Corrupt {
                    key: key.to_string(),
                    value: raw,
                }),
        }
    }
}

/// Append-only log of usage events read by the statistics view.
pub trait UsageLog {
    fn record_usage(&mut self, record: &UsageRecord) -> Result<(), StoreError>;

    fn usage_records(&self) -> Result<Vec<UsageRecord>, StoreError>;

    fn clear_usage(&mut self) -> Result<(), StoreError>;

    /// Apply `writes` and clear the log as one unit: either both happen or
    /// neither does.
    fn wipe(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError>;
}

/// Encode a timestamp the way [`Store::get_timestamp`] reads it.
pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn parse_value<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
) -> Result<Option<T>, StoreError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                value: raw,
            }),
    }
}
