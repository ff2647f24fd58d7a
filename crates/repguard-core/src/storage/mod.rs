mod config;
pub mod contract_db;
pub mod migrations;

pub use config::Config;
pub use contract_db::ContractDb;

use std::path::PathBuf;

/// Returns `~/.config/repguard[-dev]/` based on REPGUARD_ENV.
///
/// Set REPGUARD_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("REPGUARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("repguard-dev")
    } else {
        base_dir.join("repguard")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
