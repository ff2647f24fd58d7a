//! Configuration management commands for CLI.

use clap::Subcommand;
use repguard_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set a configuration value
    Set {
        /// Key, e.g. dispatcher.retry_limit or notifications.gateway_url
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            match key.as_str() {
                "dispatcher.tick_interval_minutes" => {
                    config.dispatcher.tick_interval_minutes = value.parse()?;
                }
                "dispatcher.max_parallel_deliveries" => {
                    config.dispatcher.max_parallel_deliveries = value.parse()?;
                }
                "dispatcher.retry_limit" => {
                    config.dispatcher.retry_limit = value.parse()?;
                }
                "reminders.checkin_interval_days" => {
                    config.reminders.checkin_interval_days = value.parse()?;
                }
                "reminders.expiration_warning_days" => {
                    config.reminders.expiration_warning_days = value.parse()?;
                }
                "reminders.renewal_due_days" => {
                    config.reminders.renewal_due_days = value.parse()?;
                }
                "notifications.gateway_url" => {
                    config.notifications.gateway_url = value;
                }
                other => {
                    return Err(format!("unknown configuration key: {other}").into());
                }
            }
            config.save()?;
            println!("Configuration saved");
        }
    }

    Ok(())
}
