//! Bookshelf CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bookshelf-cli migrate
//!
//! # Create a verified account
//! bookshelf-cli account create -e ada@example.com -n "Ada Lovelace" -p secret123 --verified
//!
//! # Mark an account verified
//! bookshelf-cli account verify -e ada@example.com
//!
//! # Delete an account and its books
//! bookshelf-cli account delete -e ada@example.com
//!
//! # Load demo data
//! bookshelf-cli seed --file seeds/catalog.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bookshelf-cli")]
#[command(author, version, about = "Bookshelf CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Seed the database from a YAML file
    Seed {
        /// Path to the seed file
        #[arg(short, long, default_value = "seeds/catalog.yaml")]
        file: String,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Create a new account
    Create {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Mark the email as verified
        #[arg(long)]
        verified: bool,
    },
    /// Mark an account's email as verified
    Verify {
        #[arg(short, long)]
        email: String,
    },
    /// Delete an account and all of its books
    Delete {
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Account { action } => match action {
            AccountAction::Create {
                email,
                name,
                password,
                verified,
            } => commands::account::create(&email, &name, &password, verified).await,
            AccountAction::Verify { email } => commands::account::verify(&email).await,
            AccountAction::Delete { email } => commands::account::delete(&email).await,
        },
        Commands::Seed { file } => commands::seed::run(&file).await,
    }
}
