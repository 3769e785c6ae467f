//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per request)
//! 2. Request ID (ensure `x-request-id`, echo it back)
//! 3. `TraceLayer` (request span tagged with the request ID)
//! 4. CORS
//!
//! Authentication is not a layer: shopper routes take the
//! [`RequireUser`] extractor.

pub mod auth;
pub mod request_id;

pub use auth::RequireUser;
pub use request_id::{make_request_span, request_id_middleware};
