//! Request middleware.

pub mod xmlrpc_guard;

pub use xmlrpc_guard::{shared, xmlrpc_guard_middleware, GuardState, SharedGuardState};
