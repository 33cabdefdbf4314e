//! XML-RPC Access Guard Library
//!
//! Rejects XML-RPC calls that claim to come from the Jetpack service
//! (`?for=jetpack`) unless the caller's address is inside the service's
//! published IPv4 ranges. Everything else is forwarded to the upstream site.

pub mod check;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GuardServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{AccessGuard, Decision, RequestContext};
