//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs whose `sub` claim is the shopper's user id.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use emporium_core::UserId;

/// Claims carried by a shopper token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

/// Token errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token subject is not a user id: {0}")]
    BadSubject(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signs and verifies shopper tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenService {
    /// Create a token service.
    #[must_use]
    pub fn new(secret: &SecretString, issuer: impl Into<String>, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            ttl,
        }
    }

    /// Issue a token for a user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return the user it was issued to.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` if the signature, issuer or expiry do not check
    /// out, or if the subject is not a user id.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        data.claims
            .sub
            .parse()
            .map_err(|_| TokenError::BadSubject(data.claims.sub))
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Extract the token from an `Authorization: Bearer ...` header value.
#[must_use]
pub fn bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "q7Lr2vX9pT4mW1zK8bN3cF6hJ0sD5gY";

    fn service(ttl: Duration) -> TokenService {
        TokenService::new(&SecretString::from(SECRET), "emporium", ttl)
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service(Duration::minutes(5));
        let user = UserId::generate();
        let token = tokens.issue(user).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), user);
    }

    #[test]
    fn test_expired_token_rejected() {
        // Past the default 60s validation leeway.
        let tokens = service(Duration::minutes(-10));
        let token = tokens.issue(UserId::generate()).unwrap();
        assert!(matches!(tokens.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = service(Duration::minutes(5))
            .issue(UserId::generate())
            .unwrap();
        let other = TokenService::new(
            &SecretString::from("Zk3Pq8Wn1Vr6Ty0Ub5Xm2Lc9Hd4Gf7Js"),
            "emporium",
            Duration::minutes(5),
        );
        assert!(matches!(
            other.verify(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_other_issuer_rejected() {
        let token = service(Duration::minutes(5))
            .issue(UserId::generate())
            .unwrap();
        let other = TokenService::new(&SecretString::from(SECRET), "elsewhere", Duration::minutes(5));
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = service(Duration::minutes(5));
        assert!(tokens.verify("not.a.jwt").is_err());
        assert!(tokens.verify("").is_err());
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let claims = Claims {
            sub: "admin".to_string(),
            iss: "emporium".to_string(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            service(Duration::minutes(5)).verify(&token),
            Err(TokenError::BadSubject(_))
        ));
    }

    #[test]
    fn test_bearer() {
        assert_eq!(bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer("Bearer "), None);
        assert_eq!(bearer("Basic abc"), None);
    }
}
