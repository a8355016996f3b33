//! Tradewind CLI - Database migrations, demo data and user management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! tw-cli migrate
//!
//! # Load the bundled demo catalog and accounts
//! tw-cli seed
//!
//! # Load a custom seed file
//! tw-cli seed --file path/to/seed.yaml
//!
//! # Create an admin account
//! tw-cli user create -e admin@example.com -p 'a long password' -r admin
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` or `DATABASE_URL` - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tw-cli")]
#[command(author, version, about = "Tradewind CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with demo categories, users and products
    Seed {
        /// YAML seed file (defaults to the bundled demo data)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user with a password
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`customer`, `seller`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,

        /// First name
        #[arg(long, default_value = "Tradewind")]
        first_name: String,

        /// Last name
        #[arg(long, default_value = "User")]
        last_name: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(file.as_deref()).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                role,
                first_name,
                last_name,
            } => {
                commands::user::create(&email, &password, &role, &first_name, &last_name).await?;
            }
        },
    }
    Ok(())
}
