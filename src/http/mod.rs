//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign x-request-id)
//!     → middleware/xmlrpc_guard.rs (pass through or halt)
//!     → proxy.rs (forward to upstream site)
//!     → Send upstream response to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
