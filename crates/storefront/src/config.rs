//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection
//!   string, required unless `STOREFRONT_STORE=memory`
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` / `STOREFRONT_PORT` - Listen port (default: 8000)
//! - `STOREFRONT_STORE` - `postgres` (default) or `memory`
//! - `STOREFRONT_JWT_ISSUER` - Token issuer (default: emporium)
//! - `STOREFRONT_TOKEN_TTL_MINUTES` - Token lifetime (default: 1440)
//! - `STOREFRONT_CORS_ORIGINS` - Comma-separated allowed origins
//!   (default: `http://localhost:8080`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8080";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which store backend serves the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Store backend
    pub store: StoreBackend,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Bearer token settings
    pub auth: AuthConfig,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Error tracking
    pub sentry: SentryConfig,
}

/// Bearer token settings.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: SecretString,
    /// Expected `iss` claim
    pub issuer: String,
    /// Lifetime of issued tokens
    pub token_ttl_minutes: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .finish()
    }
}

/// Sentry settings.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = match get_optional_env("PORT") {
            Some(port) => parse_value("PORT", &port)?,
            None => parse_env("STOREFRONT_PORT", "8000")?,
        };
        let store: StoreBackend = parse_env("STOREFRONT_STORE", "postgres")?;
        let database_url = match store {
            StoreBackend::Postgres => Some(get_database_url("STOREFRONT_DATABASE_URL")?),
            StoreBackend::Memory => get_database_url("STOREFRONT_DATABASE_URL").ok(),
        };

        let auth = AuthConfig::from_env()?;
        let cors_origins = parse_origins(
            "STOREFRONT_CORS_ORIGINS",
            &get_env_or_default("STOREFRONT_CORS_ORIGINS", DEFAULT_CORS_ORIGIN),
        )?;
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            host,
            port,
            store,
            database_url,
            auth,
            cors_origins,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    /// Load token settings on their own. Used by the CLI to issue tokens.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the secret is missing or weak, or the TTL is
    /// not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("STOREFRONT_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "STOREFRONT_JWT_SECRET")?;

        let token_ttl_minutes: i64 = parse_env("STOREFRONT_TOKEN_TTL_MINUTES", "1440")?;
        if token_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_TOKEN_TTL_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            jwt_secret,
            issuer: get_env_or_default("STOREFRONT_JWT_ISSUER", "emporium"),
            token_ttl_minutes,
        })
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes)
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_rate("SENTRY_SAMPLE_RATE", defaults.sample_rate)?,
            traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", defaults.traces_sample_rate)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Parse a sample rate in `[0, 1]`.
fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate: f32 = parse_value(key, &raw)?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0 and 1 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Split a comma-separated origin list, dropping blanks.
/// Split a comma-separated origin list.
///
/// The wildcard is rejected: credentialed CORS requires explicit origins.
fn parse_origins(var_name: &str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();

    if origins.iter().any(|o| o == "*") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "wildcard origin is not allowed; list origins explicitly".to_string(),
        ));
    }
    Ok(origins)
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-jwt-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err =
            validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" Postgres ".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("ORIGINS", "http://localhost:8080, https://shop.example.org,,").unwrap(),
            vec!["http://localhost:8080", "https://shop.example.org"]
        );
        assert!(parse_origins("ORIGINS", "").unwrap().is_empty());
    }

    #[test]
    fn test_parse_origins_rejects_wildcard() {
        for raw in ["*", "http://localhost:8080, *"] {
            let err = parse_origins("STOREFRONT_CORS_ORIGINS", raw).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnvVar(ref var, _) if var == "STOREFRONT_CORS_ORIGINS"));
        }
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            store: StoreBackend::Memory,
            database_url: None,
            auth: AuthConfig {
                jwt_secret: SecretString::from("x".repeat(32)),
                issuer: "emporium".to_string(),
                token_ttl_minutes: 60,
            },
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            sentry: SentryConfig::default(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let config = AuthConfig {
            jwt_secret: SecretString::from("super_secret_signing_key_value_1234"),
            issuer: "emporium".to_string(),
            token_ttl_minutes: 60,
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("emporium"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_signing_key_value_1234"));
    }
}
