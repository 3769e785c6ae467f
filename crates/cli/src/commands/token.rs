//! Bearer token commands.
//!
//! # Usage
//!
//! ```bash
//! emporium token issue --user-id 6f1c...
//! ```
//!
//! Tokens are signed with `STOREFRONT_JWT_SECRET`, so the server must share
//! the same secret and issuer to accept them.

use emporium_core::UserId;
use emporium_storefront::config::AuthConfig;
use emporium_storefront::services::TokenService;

use super::CliError;

/// Print a bearer token for a shopper.
///
/// Does not check that the shopper exists.
///
/// # Errors
///
/// Returns an error if the user ID is malformed or the token settings are
/// missing or weak.
pub fn issue(user_id: &str) -> Result<(), CliError> {
    let user_id: UserId = user_id.parse()?;
    let auth = AuthConfig::from_env()?;
    let tokens = TokenService::new(&auth.jwt_secret, auth.issuer.clone(), auth.token_ttl());

    let token = tokens.issue(user_id)?;
    tracing::info!(
        user_id = %user_id,
        ttl_minutes = auth.token_ttl_minutes,
        "Issued token"
    );

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}
