//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → http::middleware::xmlrpc_guard (build RequestContext)
//!     → guard.rs (should_intercept → is_authorized → Decision)
//!     → ip_range.rs (membership test against the range table)
//!     → Pass to upstream, or halt with the rejection message
//! ```
//!
//! # Design Decisions
//! - Fail closed: an address that does not parse is never authorized
//! - No I/O and no logging here; callers decide what to record
//! - Range table is immutable and shared, so evaluation needs no locks

pub mod guard;
pub mod ip_range;

pub use guard::{AccessGuard, Decision, RequestContext, PROVIDER_IDENTITY, REJECTION_MESSAGE};
pub use ip_range::{IpRange, RangeEntry, RangeError};
