//! Client management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use repguard_core::{Client, ContractDb, NotificationMethod};

#[derive(Subcommand)]
pub enum ClientAction {
    /// Register a new client
    Create {
        /// Client display name
        name: String,
        /// Owning agent ID
        #[arg(long)]
        agent: String,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Phone number
        #[arg(long)]
        phone: Option<String>,
        /// Preferred notification method: email, sms, or in_app
        #[arg(long, default_value = "email")]
        method: String,
    },
    /// List clients for an agent
    List {
        /// Owning agent ID
        #[arg(long)]
        agent: String,
    },
    /// Get client details
    Get {
        /// Client ID
        id: String,
    },
}

pub fn run(action: ClientAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ContractDb::open()?;

    match action {
        ClientAction::Create {
            name,
            agent,
            email,
            phone,
            method,
        } => {
            let mut client = Client::new(agent, name, Utc::now());
            client.email = email;
            client.phone = phone;
            client.preferred_method = match method.as_str() {
                "sms" => NotificationMethod::Sms,
                "in_app" => NotificationMethod::InApp,
                _ => NotificationMethod::Email,
            };
            db.create_client(&client)?;
            println!("Client created: {}", client.id);
            println!("{}", serde_json::to_string_pretty(&client)?);
        }
        ClientAction::List { agent } => {
            let clients = db.list_clients(&agent)?;
            println!("{}", serde_json::to_string_pretty(&clients)?);
        }
        ClientAction::Get { id } => match db.get_client(&id)? {
            Some(client) => println!("{}", serde_json::to_string_pretty(&client)?),
            None => println!("Client not found: {id}"),
        },
    }

    Ok(())
}
