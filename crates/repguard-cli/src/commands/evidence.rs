//! Breach evidence ingestion commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use repguard_core::{AlertManager, ContractDb, EvidenceRecord};

use super::{notifier_from_config, parse_date};

#[derive(Subcommand)]
pub enum EvidenceAction {
    /// Ingest a JSON file of evidence records from the feed
    Ingest {
        /// Path to a JSON array of evidence records
        file: String,
    },
    /// Ingest a single evidence record from arguments
    Record {
        /// Client ID the evidence refers to
        #[arg(long)]
        client: String,
        /// Feed's stable transaction reference
        #[arg(long)]
        transaction: String,
        /// Transaction date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        date: String,
        /// Transaction side: purchase or sale
        #[arg(long)]
        side: String,
        /// Transacting agent, omit for an unrepresented transaction
        #[arg(long)]
        agent: Option<String>,
        /// Property reference
        #[arg(long)]
        property: String,
    },
}

pub fn run(action: EvidenceAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ContractDb::open()?;
    let config = repguard_core::Config::load()?;
    let notifier = notifier_from_config(&config);
    let manager = AlertManager::new(&db, notifier.as_ref());

    let records = match action {
        EvidenceAction::Ingest { file } => {
            let content = std::fs::read_to_string(&file)?;
            serde_json::from_str::<Vec<EvidenceRecord>>(&content)?
        }
        EvidenceAction::Record {
            client,
            transaction,
            date,
            side,
            agent,
            property,
        } => {
            let side = match side.as_str() {
                "sale" => repguard_core::TransactionSide::Sale,
                "purchase" => repguard_core::TransactionSide::Purchase,
                other => return Err(format!("unknown transaction side: {other}").into()),
            };
            vec![EvidenceRecord {
                client_ref: client,
                transaction_ref: transaction,
                transaction_date: parse_date(&date)?,
                side,
                transacting_agent: agent,
                property_ref: property,
            }]
        }
    };

    let summary = manager.ingest_evidence(&records, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
