//! TOML-based application configuration.
//!
//! Stores operational settings:
//! - Dispatcher cadence, delivery parallelism, and retry bound
//! - Reminder offsets (check-in interval, warning windows)
//! - Notification gateway and default method
//!
//! Configuration is stored at `~/.config/repguard/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;
use crate::reminder::{DispatcherConfig, SchedulerConfig};

/// Dispatcher configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSection {
    #[serde(default = "default_tick_interval_minutes")]
    pub tick_interval_minutes: u64,
    #[serde(default = "default_max_parallel_deliveries")]
    pub max_parallel_deliveries: usize,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: i64,
}

/// Reminder scheduling configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersSection {
    #[serde(default = "default_checkin_interval_days")]
    pub checkin_interval_days: i64,
    #[serde(default = "default_expiration_warning_days")]
    pub expiration_warning_days: i64,
    #[serde(default = "default_renewal_due_days")]
    pub renewal_due_days: i64,
}

/// Notification configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsSection {
    /// HTTP gateway the webhook notifier posts to. Empty means the
    /// console fallback is used.
    #[serde(default)]
    pub gateway_url: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/repguard/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub dispatcher: DispatcherSection,
    #[serde(default)]
    pub reminders: RemindersSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
}

fn default_tick_interval_minutes() -> u64 {
    5
}
fn default_max_parallel_deliveries() -> usize {
    4
}
fn default_retry_limit() -> i64 {
    3
}
fn default_checkin_interval_days() -> i64 {
    7
}
fn default_expiration_warning_days() -> i64 {
    30
}
fn default_renewal_due_days() -> i64 {
    7
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            tick_interval_minutes: default_tick_interval_minutes(),
            max_parallel_deliveries: default_max_parallel_deliveries(),
            retry_limit: default_retry_limit(),
        }
    }
}

impl Default for RemindersSection {
    fn default() -> Self {
        Self {
            checkin_interval_days: default_checkin_interval_days(),
            expiration_warning_days: default_expiration_warning_days(),
            renewal_due_days: default_renewal_due_days(),
        }
    }
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file
    /// does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/repguard/config.toml"),
            message: e.to_string(),
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save the configuration to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().map_err(|e| ConfigError::SaveFailed {
            path: PathBuf::from("~/.config/repguard/config.toml"),
            message: e.to_string(),
        })?;

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Scheduler view of this configuration.
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            checkin_interval_days: self.reminders.checkin_interval_days,
            expiration_warning_days: self.reminders.expiration_warning_days,
            renewal_due_days: self.reminders.renewal_due_days,
        }
    }

    /// Dispatcher view of this configuration.
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            tick_interval_minutes: self.dispatcher.tick_interval_minutes,
            max_parallel_deliveries: self.dispatcher.max_parallel_deliveries,
            retry_limit: self.dispatcher.retry_limit,
        }
    }
}
