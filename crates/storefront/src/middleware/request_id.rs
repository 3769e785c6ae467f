//! Request ID middleware for request tracing and correlation.
//!
//! Ensures every request carries an `x-request-id` header before it reaches
//! the trace layer, generating a UUID v4 when no upstream proxy supplied one.
//! The ID is added to the Sentry scope and echoed in the response headers.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest request ID accepted from upstream; longer values are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = upstream_request_id(request.headers())
        .map_or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()), Ok);

    let Ok(request_id) = request_id else {
        return next.run(request).await;
    };

    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());

    if let Ok(id) = request_id.to_str() {
        sentry::configure_scope(|scope| {
            scope.set_tag("request_id", id);
        });
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

/// Build the per-request tracing span, carrying the request ID.
///
/// Used as the `TraceLayer` span maker so every log line inside a handler is
/// tagged with the request it belongs to.
pub fn make_request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
        user_id = tracing::field::Empty,
    )
}

fn upstream_request_id(headers: &axum::http::HeaderMap) -> Option<HeaderValue> {
    headers
        .get(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN && v.to_str().is_ok())
        .cloned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderMap;

    use super::*;

    #[test]
    fn test_upstream_request_id_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("cf-1234"));
        assert_eq!(upstream_request_id(&headers).unwrap(), "cf-1234");
    }

    #[test]
    fn test_oversized_request_id_dropped() {
        let mut headers = HeaderMap::new();
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());
        assert!(upstream_request_id(&headers).is_none());
        assert!(upstream_request_id(&HeaderMap::new()).is_none());
    }
}
