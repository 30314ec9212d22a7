//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions)
//!
//! Authentication is enforced per handler through the [`RequireAuth`]
//! extractor rather than a layer.

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{RequireAuth, clear_current_account, set_current_account};
pub use request_id::{RequestId, request_id_middleware};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, session_layer};
