//! Reminder scheduling and dispatch commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use repguard_core::{ContractDb, ReminderDispatcher, ReminderScheduler};

use super::notifier_from_config;

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Set up the reminder plan for one contract
    Setup {
        /// Contract ID
        contract_id: String,
    },
    /// Set up automated reminders for all active contracts of an agent
    SetupAll {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
    },
    /// List reminders for a contract
    List {
        /// Contract ID
        contract_id: String,
    },
    /// Process all pending reminders now (retries failed ones)
    Process {
        /// Only dispatch due pending reminders; skip failed retries
        #[arg(long)]
        due_only: bool,
    },
    /// Failed reminders past the retry limit
    Attention {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
    },
    /// Run the dispatcher as a periodic background task
    Watch,
}

pub fn run(action: ReminderAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ContractDb::open()?;
    let config = repguard_core::Config::load()?;

    match action {
        ReminderAction::Setup { contract_id } => {
            let scheduler = ReminderScheduler::with_config(&db, config.scheduler());
            let created = scheduler.setup_for_contract(&contract_id, Utc::now())?;
            println!("Reminders created: {}", created.len());
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        ReminderAction::SetupAll { agent } => {
            let scheduler = ReminderScheduler::with_config(&db, config.scheduler());
            let summary = scheduler.setup_all(&agent, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ReminderAction::List { contract_id } => {
            let reminders = db.list_reminders_for_contract(&contract_id)?;
            println!("{}", serde_json::to_string_pretty(&reminders)?);
        }
        ReminderAction::Process { due_only } => {
            let notifier = notifier_from_config(&config);
            let dispatcher =
                ReminderDispatcher::with_config(&db, notifier.as_ref(), config.dispatcher());
            let summary = if due_only {
                dispatcher.process_due(Utc::now())?
            } else {
                dispatcher.process_pending(Utc::now())?
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ReminderAction::Attention { agent } => {
            let notifier = notifier_from_config(&config);
            let dispatcher =
                ReminderDispatcher::with_config(&db, notifier.as_ref(), config.dispatcher());
            let reminders = dispatcher.needs_attention(&agent)?;
            println!("{}", serde_json::to_string_pretty(&reminders)?);
        }
        ReminderAction::Watch => {
            let notifier = notifier_from_config(&config);
            let dispatcher =
                ReminderDispatcher::with_config(&db, notifier.as_ref(), config.dispatcher());
            println!(
                "Watching for due reminders every {} minutes (ctrl-c to stop)",
                config.dispatcher.tick_interval_minutes
            );
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(dispatcher.run())?;
        }
    }

    Ok(())
}
