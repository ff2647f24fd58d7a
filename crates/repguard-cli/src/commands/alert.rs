//! Alert management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use repguard_core::{AlertManager, ContractDb};

use super::notifier_from_config;

#[derive(Subcommand)]
pub enum AlertAction {
    /// List unresolved alerts for an agent, unread first
    List {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
    },
    /// Full alert history for a contract
    History {
        /// Contract ID
        contract_id: String,
    },
    /// Mark an alert as read
    Read {
        /// Alert ID
        id: String,
    },
    /// Resolve an alert after human review
    Resolve {
        /// Alert ID
        id: String,
    },
    /// Raise expiration alerts for contracts nearing their end date
    Sweep {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
    },
}

pub fn run(action: AlertAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ContractDb::open()?;
    let config = repguard_core::Config::load()?;
    let notifier = notifier_from_config(&config);
    let manager = AlertManager::new(&db, notifier.as_ref());

    match action {
        AlertAction::List { agent } => {
            let alerts = manager.list_active(&agent)?;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }
        AlertAction::History { contract_id } => {
            let alerts = manager.list_for_contract(&contract_id)?;
            println!("{}", serde_json::to_string_pretty(&alerts)?);
        }
        AlertAction::Read { id } => {
            manager.mark_read(&id)?;
            println!("Alert marked read: {id}");
        }
        AlertAction::Resolve { id } => {
            let outcome = manager.resolve(&id, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        AlertAction::Sweep { agent } => {
            let summary = manager.sweep_expirations(&agent, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
