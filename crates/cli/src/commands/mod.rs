//! CLI command implementations.

pub mod migrate;
pub mod orders;
pub mod seed;
pub mod token;
pub mod user;

use secrecy::SecretString;
use thiserror::Error;

use emporium_core::IdError;
use emporium_storefront::config::ConfigError;
use emporium_storefront::db::{self, PgStore, StoreError};
use emporium_storefront::services::TokenError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Could not read an input file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not valid YAML for the expected shape.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed identifier on the command line.
    #[error(transparent)]
    Id(#[from] IdError),

    /// Token could not be signed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Read the storefront database URL, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CliError> {
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Connect to the storefront database.
async fn connect() -> Result<PgStore, CliError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
