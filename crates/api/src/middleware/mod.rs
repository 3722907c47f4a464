//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per request)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID (recorded into that span)
//! 4. CORS
//! 5. Panic catcher (last resort for panics outside a unit of work)

pub mod auth;
pub mod payload;
pub mod request_id;

pub use auth::RequireAuth;
pub use payload::Payload;
pub use request_id::request_id_middleware;
