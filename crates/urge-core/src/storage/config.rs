//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Onboarding defaults (daily limit, wait interval, panic allowance)
//! - Tick cadences for the display refresh and rollover check
//! - Notification and companion toggles
//! - Calendar week start
//!
//! Configuration is stored at `~/.config/urge/config.toml`. The values a
//! user picks during onboarding live in the durable store, not here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::allowance::{AllowanceConfig, WeekStart};
use crate::error::ConfigError;
use crate::substance::SubstanceProfile;

/// Values offered during onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: f64,
    #[serde(default = "default_weekly_panic_limit")]
    pub weekly_panic_limit: u32,
    #[serde(default)]
    pub substance: SubstanceProfile,
}

/// Tick cadences in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicksConfig {
    #[serde(default = "default_display_secs")]
    pub display_secs: u64,
    #[serde(default = "default_rollover_secs")]
    pub rollover_secs: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub haptics: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PremiumConfig {
    #[serde(default)]
    pub unlocked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub week_start: WeekStart,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/urge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub ticks: TicksConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default)]
    pub premium: PremiumConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

// Default functions
fn default_daily_limit() -> u32 {
    10
}
fn default_interval_hours() -> f64 {
    2.0
}
fn default_weekly_panic_limit() -> u32 {
    5
}
fn default_display_secs() -> u64 {
    1
}
fn default_rollover_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            interval_hours: default_interval_hours(),
            weekly_panic_limit: default_weekly_panic_limit(),
            substance: SubstanceProfile::default(),
        }
    }
}

impl Default for TicksConfig {
    fn default() -> Self {
        Self {
            display_secs: default_display_secs(),
            rollover_secs: default_rollover_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            haptics: true,
        }
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl DefaultsConfig {
    /// Onboarding defaults as a clamped allowance configuration.
    pub fn allowance(&self) -> AllowanceConfig {
        AllowanceConfig::new(
            self.daily_limit,
            hours_to_secs(self.interval_hours),
            self.weekly_panic_limit,
        )
    }
}

/// Hours (possibly fractional) to whole seconds, never negative.
pub fn hours_to_secs(hours: f64) -> u64 {
    if hours.is_finite() && hours > 0.0 {
        (hours * 3600.0).round() as u64
    } else {
        0
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if the key is
    /// unknown or the value does not fit the field.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Display tick cadence, never below one second.
    pub fn display_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ticks.display_secs.max(1))
    }

    /// Rollover tick cadence, clamped to 1..=60 seconds.
    pub fn rollover_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ticks.rollover_secs.clamp(1, 60))
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.defaults.daily_limit, 10);
        assert_eq!(parsed.ticks.rollover_secs, 60);
        assert_eq!(parsed.calendar.week_start, WeekStart::Monday);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[defaults]\ndaily_limit = 4\n").unwrap();
        assert_eq!(parsed.defaults.daily_limit, 4);
        assert_eq!(parsed.defaults.weekly_panic_limit, 5);
        assert!(parsed.notifications.enabled);
        assert!(!parsed.premium.unlocked);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("notifications.haptics").as_deref(), Some("true"));
        assert_eq!(cfg.get("defaults.daily_limit").as_deref(), Some("10"));
        assert_eq!(cfg.get("calendar.week_start").as_deref(), Some("monday"));
        assert!(cfg.get("defaults.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("premium.unlocked", "true").unwrap();
        cfg.apply("defaults.interval_hours", "1.5").unwrap();
        cfg.apply("calendar.week_start", "sunday").unwrap();
        assert!(cfg.premium.unlocked);
        assert_eq!(cfg.defaults.interval_hours, 1.5);
        assert_eq!(cfg.calendar.week_start, WeekStart::Sunday);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("ui.dark_mode", "true"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn apply_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("companion.enabled", "not_a_bool").is_err());
        assert!(cfg.apply("calendar.week_start", "friday").is_err());
        // Unchanged after a failed apply.
        assert!(cfg.companion.enabled);
    }

    #[test]
    fn defaults_allowance_is_clamped() {
        let mut cfg = Config::default();
        cfg.defaults.interval_hours = 0.25;
        cfg.defaults.weekly_panic_limit = 0;
        let allowance = cfg.defaults.allowance();
        assert_eq!(allowance.interval_secs(), AllowanceConfig::MIN_INTERVAL_SECS);
        assert_eq!(allowance.weekly_panic_limit(), 1);
    }

    #[test]
    fn tick_intervals_are_bounded() {
        let mut cfg = Config::default();
        cfg.ticks.display_secs = 0;
        cfg.ticks.rollover_secs = 600;
        assert_eq!(cfg.display_interval().as_secs(), 1);
        assert_eq!(cfg.rollover_interval().as_secs(), 60);
    }
}
