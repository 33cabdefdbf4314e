//! XML-RPC access guard.
//!
//! Decides, per request, whether a call that claims to come from the
//! provider is allowed through. The guard only sees an immutable
//! [`RequestContext`]; building that context from HTTP is the job of
//! `http::middleware::xmlrpc_guard`.
//!
//! ```text
//! Unchecked ──should_intercept?──no──▶ NotApplicable (pass through)
//!     │
//!    yes
//!     │
//!     └──is_authorized?──yes──▶ Authorized (pass through)
//!                 │
//!                 no
//!                 └──▶ Halted (terminal)
//! ```

use std::sync::Arc;

use crate::security::ip_range::{self, IpRange, RangeError, RangeEntry};

/// Value of the `for` query parameter that marks a provider call.
pub const PROVIDER_IDENTITY: &str = "jetpack";

/// Body written to the caller when a request is halted.
pub const REJECTION_MESSAGE: &str = "Pretending to be a Jetpack Server eh?";

/// The request properties the guard looks at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    /// Request targets the XML-RPC endpoint.
    pub is_xmlrpc: bool,
    /// Raw value of the `for` query parameter, if present.
    pub for_param: Option<String>,
    /// Caller address as exposed by the transport.
    pub source_ip: String,
}

impl RequestContext {
    pub fn new(is_xmlrpc: bool, for_param: Option<&str>, source_ip: impl Into<String>) -> Self {
        Self {
            is_xmlrpc,
            for_param: for_param.map(str::to_string),
            source_ip: source_ip.into(),
        }
    }
}

/// Outcome of [`AccessGuard::enforce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not an XML-RPC provider call; the guard has nothing to say.
    NotApplicable,
    /// Provider call from an address inside the published ranges.
    Authorized,
    /// Provider call from anywhere else. Processing must stop.
    Halted,
}

impl Decision {
    pub fn is_halted(self) -> bool {
        matches!(self, Decision::Halted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::NotApplicable => "not_applicable",
            Decision::Authorized => "pass_through",
            Decision::Halted => "halted",
        }
    }
}

/// Immutable guard: a provider identity and the ranges it is allowed to call from.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    provider_identity: String,
    ranges: Arc<[IpRange]>,
}

impl AccessGuard {
    pub fn new(provider_identity: impl Into<String>, ranges: Vec<IpRange>) -> Self {
        Self {
            provider_identity: provider_identity.into(),
            ranges: ranges.into(),
        }
    }

    /// Guard for the `jetpack` identity with the compiled-in range table.
    pub fn jetpack() -> Self {
        // The reference table is covered by tests; it always compiles.
        let ranges = ip_range::JETPACK_RANGES
            .iter()
            .filter_map(|(low, high)| IpRange::parse(low, high).ok())
            .collect();
        Self::new(PROVIDER_IDENTITY, ranges)
    }

    /// Build a guard from config entries.
    pub fn from_entries(
        provider_identity: impl Into<String>,
        entries: &[RangeEntry],
    ) -> Result<Self, RangeError> {
        Ok(Self::new(provider_identity, ip_range::compile(entries)?))
    }

    pub fn provider_identity(&self) -> &str {
        &self.provider_identity
    }

    pub fn ranges(&self) -> &[IpRange] {
        &self.ranges
    }

    /// True only for XML-RPC requests whose `for` parameter is exactly the provider identity.
    pub fn should_intercept(&self, ctx: &RequestContext) -> bool {
        ctx.is_xmlrpc && ctx.for_param.as_deref() == Some(self.provider_identity.as_str())
    }

    pub fn is_authorized(&self, ip: &str) -> bool {
        ip_range::is_authorized(ip, &self.ranges)
    }

    pub fn enforce(&self, ctx: &RequestContext) -> Decision {
        if !self.should_intercept(ctx) {
            return Decision::NotApplicable;
        }

        if self.is_authorized(&ctx.source_ip) {
            Decision::Authorized
        } else {
            Decision::Halted
        }
    }
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::jetpack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(is_xmlrpc: bool, for_param: Option<&str>, ip: &str) -> RequestContext {
        RequestContext::new(is_xmlrpc, for_param, ip)
    }

    #[test]
    fn test_jetpack_guard_has_reference_table() {
        let guard = AccessGuard::jetpack();
        assert_eq!(guard.ranges().len(), ip_range::JETPACK_RANGES.len());
        assert_eq!(guard.provider_identity(), "jetpack");
    }

    #[test]
    fn test_should_intercept_requires_xmlrpc() {
        let guard = AccessGuard::jetpack();
        assert!(guard.should_intercept(&ctx(true, Some("jetpack"), "1.2.3.4")));
        assert!(!guard.should_intercept(&ctx(false, Some("jetpack"), "1.2.3.4")));
        assert!(!guard.should_intercept(&ctx(false, None, "1.2.3.4")));
    }

    #[test]
    fn test_should_intercept_exact_identity() {
        let guard = AccessGuard::jetpack();
        for value in [None, Some(""), Some("Jetpack"), Some("JETPACK"), Some("jetpack "), Some(" jetpack"), Some("jetpacks"), Some("other")] {
            assert!(!guard.should_intercept(&ctx(true, value, "1.2.3.4")), "{value:?}");
        }
    }

    #[test]
    fn test_scenario_authorized_provider() {
        let guard = AccessGuard::jetpack();
        let decision = guard.enforce(&ctx(true, Some("jetpack"), "216.151.209.100"));
        assert_eq!(decision, Decision::Authorized);
        assert!(!decision.is_halted());
    }

    #[test]
    fn test_scenario_impostor_halted() {
        let guard = AccessGuard::jetpack();
        assert_eq!(guard.enforce(&ctx(true, Some("jetpack"), "1.2.3.4")), Decision::Halted);
    }

    #[test]
    fn test_scenario_other_identity_not_applicable() {
        let guard = AccessGuard::jetpack();
        assert_eq!(guard.enforce(&ctx(true, Some("other"), "1.2.3.4")), Decision::NotApplicable);
    }

    #[test]
    fn test_scenario_not_xmlrpc_not_applicable() {
        let guard = AccessGuard::jetpack();
        assert_eq!(guard.enforce(&ctx(false, Some("jetpack"), "1.2.3.4")), Decision::NotApplicable);
    }

    #[test]
    fn test_scenario_exact_lower_bound() {
        let guard = AccessGuard::jetpack();
        assert_eq!(guard.enforce(&ctx(true, Some("jetpack"), "192.0.64.0")), Decision::Authorized);
    }

    #[test]
    fn test_scenario_empty_ip_fails_closed() {
        let guard = AccessGuard::jetpack();
        assert_eq!(guard.enforce(&ctx(true, Some("jetpack"), "")), Decision::Halted);
    }

    #[test]
    fn test_not_applicable_for_any_ip() {
        let guard = AccessGuard::jetpack();
        for ip in ["", "garbage", "1.2.3.4", "::1", "216.151.209.100"] {
            assert_eq!(guard.enforce(&ctx(false, Some("jetpack"), ip)), Decision::NotApplicable);
            assert_eq!(guard.enforce(&ctx(true, None, ip)), Decision::NotApplicable);
        }
    }

    #[test]
    fn test_custom_identity_and_ranges() {
        let entries = vec![RangeEntry::new("10.0.0.0", "10.0.0.255")];
        let guard = AccessGuard::from_entries("backup-service", &entries).unwrap();

        assert_eq!(guard.enforce(&ctx(true, Some("backup-service"), "10.0.0.7")), Decision::Authorized);
        assert_eq!(guard.enforce(&ctx(true, Some("backup-service"), "216.151.209.100")), Decision::Halted);
        assert_eq!(guard.enforce(&ctx(true, Some("jetpack"), "1.2.3.4")), Decision::NotApplicable);
    }
}
