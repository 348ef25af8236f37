//! chatlink CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! chatlink-cli migrate
//!
//! # Create a staff user without SMS verification
//! CHATLINK_USER_PASSWORD=... chatlink-cli user create -p +15551230001 -n "Ana" -r staff
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create users directly (bootstrap staff and admin accounts)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "chatlink-cli")]
#[command(author, version, about = "chatlink CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user, bypassing phone verification
    Create {
        /// Phone number, e.g. +15551230001
        #[arg(short, long)]
        phone: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account level (`standard`, `staff`, `admin`)
        #[arg(short, long, default_value = "standard")]
        role: String,

        /// Optional contact email
        #[arg(short, long)]
        email: Option<String>,

        /// Initial password
        #[arg(long, env = "CHATLINK_USER_PASSWORD", hide_env_values = true)]
        password: String,
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
        Commands::User { action } => match action {
            UserAction::Create {
                phone,
                name,
                role,
                email,
                password,
            } => {
                let password = SecretString::from(password);
                commands::user::create_user(&phone, &name, &role, email.as_deref(), &password)
                    .await?;
            }
        },
    }
    Ok(())
}
