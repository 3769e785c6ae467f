//! Emporium CLI - Database migrations and shop management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! emporium migrate
//!
//! # Load products from a YAML catalog
//! emporium seed products --file catalog.yaml
//!
//! # Create a shopper and issue them a bearer token
//! emporium user create --username alice
//! emporium token issue --user-id 6f1c...
//!
//! # Show a shopper's order history
//! emporium orders list --user-id 6f1c...
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `STOREFRONT_JWT_SECRET`, `STOREFRONT_JWT_ISSUER`,
//!   `STOREFRONT_TOKEN_TTL_MINUTES` - token settings, as for the server

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage shoppers
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage bearer tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Inspect order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Add products from a YAML file (a list of `{name, price, stock}`)
    Products {
        /// Path to the YAML catalog
        #[arg(short, long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a shopper with an empty cart
    Create {
        /// Unique username
        #[arg(short, long)]
        username: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a bearer token for a shopper
    Issue {
        /// Shopper's user ID
        #[arg(short, long)]
        user_id: String,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List a shopper's orders, oldest first
    List {
        /// Shopper's user ID
        #[arg(short, long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::User { action } => match action {
            UserAction::Create { username } => commands::user::create(&username).await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Issue { user_id } => commands::token::issue(&user_id)?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List { user_id } => commands::orders::list(&user_id).await?,
        },
    }
    Ok(())
}
