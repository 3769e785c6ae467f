//! Authentication extractor.
//!
//! Shopper routes take a [`RequireUser`] argument. The bearer token is read
//! from `Authorization: Bearer <jwt>`, or from the legacy `token` header that
//! older clients send.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use emporium_core::UserId;

use crate::db::ShopStore;
use crate::error::{AppError, set_sentry_user};
use crate::services::ShopError;
use crate::services::token::bearer;
use crate::state::AppState;

/// Legacy header carrying a bare token.
pub const TOKEN_HEADER: &str = "token";

/// Extractor that requires a valid shopper token.
///
/// Rejects with `401 Unauthorized` if the token is missing, malformed,
/// expired or signed by someone else.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireUser(user_id): RequireUser) -> String {
///     format!("Hello, {user_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub UserId);

impl<S: ShopStore> FromRequestParts<AppState<S>> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ShopError::Unauthorized("missing bearer token".to_string()))?;

        let user_id = state.tokens().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ShopError::Unauthorized(e.to_string())
        })?;

        Span::current().record("user_id", tracing::field::display(user_id));
        set_sentry_user(&user_id);

        Ok(Self(user_id))
    }
}

/// Find the token in `Authorization: Bearer` first, then the legacy header.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer)
    {
        return Some(token);
    }

    headers
        .get(TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer aaa"));
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("bbb"));
        assert_eq!(token_from_headers(&headers), Some("aaa"));
    }

    #[test]
    fn test_legacy_token_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static(" bbb "));
        assert_eq!(token_from_headers(&headers), Some("bbb"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(token_from_headers(&headers), None);
    }
}
