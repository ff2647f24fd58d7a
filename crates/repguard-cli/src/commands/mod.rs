//! CLI command implementations.

pub mod alert;
pub mod client;
pub mod config;
pub mod contract;
pub mod evidence;
pub mod reminder;

use chrono::{DateTime, TimeZone, Utc};
use repguard_core::{Config, ConsoleNotifier, Notifier, WebhookNotifier};

/// Notifier selected from configuration: the webhook gateway when one is
/// set, the console fallback otherwise.
pub fn notifier_from_config(config: &Config) -> Box<dyn Notifier> {
    if config.notifications.gateway_url.is_empty() {
        Box::new(ConsoleNotifier)
    } else {
        Box::new(WebhookNotifier::new(
            config.notifications.gateway_url.clone(),
        ))
    }
}

/// Parse a date argument: RFC 3339 or a plain `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or("invalid date")?;
    Ok(Utc.from_utc_datetime(&midnight))
}
