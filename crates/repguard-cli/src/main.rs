use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "repguard-cli", version, about = "Repguard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Client management
    Client {
        #[command(subcommand)]
        action: commands::client::ClientAction,
    },
    /// Contract management
    Contract {
        #[command(subcommand)]
        action: commands::contract::ContractAction,
    },
    /// Alert management
    Alert {
        #[command(subcommand)]
        action: commands::alert::AlertAction,
    },
    /// Reminder scheduling and dispatch
    Reminder {
        #[command(subcommand)]
        action: commands::reminder::ReminderAction,
    },
    /// Breach evidence ingestion
    Evidence {
        #[command(subcommand)]
        action: commands::evidence::EvidenceAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Client { action } => commands::client::run(action),
        Commands::Contract { action } => commands::contract::run(action),
        Commands::Alert { action } => commands::alert::run(action),
        Commands::Reminder { action } => commands::reminder::run(action),
        Commands::Evidence { action } => commands::evidence::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
