//! HTTP middleware stack for the orders service.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Request ID
//! 4. CORS
//! 5. Origin guard (`/api` only)

pub mod origin;
pub mod request_id;

pub use origin::{OriginPolicy, origin_guard};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
