//! Contract management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use repguard_core::{
    evaluate, Contract, ContractDb, ReminderScheduler, RepresentationType, SchedulerConfig,
};

use super::parse_date;

#[derive(Subcommand)]
pub enum ContractAction {
    /// Register a representation agreement and set up its reminders
    Create {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
        /// Protected client ID
        #[arg(long)]
        client: String,
        /// Representation type: buyer, seller, or dual
        #[arg(long, default_value = "buyer")]
        representation: String,
        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: String,
        /// End date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: String,
        /// Reference to the uploaded agreement document
        #[arg(long)]
        document: Option<String>,
    },
    /// List contracts for an agent
    List {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
        /// Include superseded protection windows
        #[arg(long)]
        all: bool,
    },
    /// Get contract details
    Get {
        /// Contract ID
        id: String,
    },
    /// Evaluate a contract's effective status
    Status {
        /// Contract ID
        id: String,
        /// Evaluation instant (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Renew a contract to a new end date
    Renew {
        /// Contract ID
        id: String,
        /// New end date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: String,
    },
    /// Flag a contract as breached
    MarkBreached {
        /// Contract ID
        id: String,
    },
    /// Attach an uploaded document reference
    AttachDocument {
        /// Contract ID
        id: String,
        /// Document reference
        document: String,
    },
    /// List contracts expiring within a horizon
    Expiring {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
        /// Horizon in days
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

pub fn run(action: ContractAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ContractDb::open()?;
    let config = repguard_core::Config::load()?;

    match action {
        ContractAction::Create {
            agent,
            client,
            representation,
            start,
            end,
            document,
        } => {
            let now = Utc::now();
            let mut contract = Contract::new(
                agent,
                client,
                match representation.as_str() {
                    "seller" => RepresentationType::Seller,
                    "dual" => RepresentationType::Dual,
                    _ => RepresentationType::Buyer,
                },
                parse_date(&start)?,
                parse_date(&end)?,
                now,
            );
            contract.document_ref = document;

            let scheduler = scheduler_for(&db, &config);
            let outcome = scheduler.register_contract(contract, now)?;

            println!("Contract created: {}", outcome.contract.id);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ContractAction::List { agent, all } => {
            let contracts = db.list_contracts(&agent, all)?;
            println!("{}", serde_json::to_string_pretty(&contracts)?);
        }
        ContractAction::Get { id } => match db.get_contract(&id)? {
            Some(contract) => println!("{}", serde_json::to_string_pretty(&contract)?),
            None => println!("Contract not found: {id}"),
        },
        ContractAction::Status { id, at } => {
            let contract = db
                .get_contract(&id)?
                .ok_or_else(|| format!("Contract not found: {id}"))?;
            let instant = match at {
                Some(s) => parse_date(&s)?,
                None => Utc::now(),
            };
            let evaluation = evaluate(&contract, instant);
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        ContractAction::Renew { id, end } => {
            let scheduler = scheduler_for(&db, &config);
            let outcome = scheduler.renew_contract(&id, parse_date(&end)?, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ContractAction::MarkBreached { id } => {
            let scheduler = scheduler_for(&db, &config);
            let outcome = scheduler.flag_breached(&id, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        ContractAction::AttachDocument { id, document } => {
            if !db.set_document_ref(&id, &document, Utc::now())? {
                return Err(format!("Contract not found: {id}").into());
            }
            println!("Document attached to {id}");
        }
        ContractAction::Expiring { agent, days } => {
            let contracts = db.expiring_within(&agent, days, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&contracts)?);
        }
    }

    Ok(())
}

fn scheduler_for<'a>(db: &'a ContractDb, config: &repguard_core::Config) -> ReminderScheduler<'a> {
    let scheduler_config: SchedulerConfig = config.scheduler();
    ReminderScheduler::with_config(db, scheduler_config)
}
