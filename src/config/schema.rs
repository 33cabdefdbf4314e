//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::guard::{PROVIDER_IDENTITY, REJECTION_MESSAGE};
use crate::security::ip_range::{default_entries, RangeEntry};

/// Root configuration for the guard server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardServerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// The protected site that passed-through requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// XML-RPC access guard settings.
    pub guard: GuardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Upstream site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:8000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// XML-RPC guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Enable the guard. When disabled every request passes through.
    pub enabled: bool,

    /// Value of the `for` query parameter that marks a provider call.
    pub provider_identity: String,

    /// Request paths treated as the XML-RPC endpoint (exact match).
    pub xmlrpc_paths: Vec<String>,

    /// Body returned to rejected callers.
    pub rejection_message: String,

    /// Status code returned to rejected callers.
    pub rejection_status: u16,

    /// Allowed source ranges. Replaces the built-in table when set.
    pub ranges: Vec<RangeEntry>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_identity: PROVIDER_IDENTITY.to_string(),
            xmlrpc_paths: vec!["/xmlrpc.php".to_string()],
            rejection_message: REJECTION_MESSAGE.to_string(),
            rejection_status: 403,
            ranges: default_entries(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: GuardServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.guard.provider_identity, "jetpack");
        assert_eq!(config.guard.xmlrpc_paths, vec!["/xmlrpc.php"]);
        assert_eq!(config.guard.ranges.len(), 15);
        assert!(config.guard.enabled);
    }

    #[test]
    fn test_ranges_override_builtin_table() {
        let config: GuardServerConfig = toml::from_str(
            r#"
            [guard]
            rejection_status = 200

            [[guard.ranges]]
            low = "10.0.0.0"
            high = "10.0.0.255"
            "#,
        )
        .unwrap();

        assert_eq!(config.guard.ranges, vec![RangeEntry::new("10.0.0.0", "10.0.0.255")]);
        assert_eq!(config.guard.rejection_status, 200);
        assert_eq!(config.guard.provider_identity, "jetpack");
    }

    #[test]
    fn test_partial_section() {
        let config: GuardServerConfig = toml::from_str(
            r#"
            [upstream]
            address = "10.1.1.1:80"

            [observability]
            json_logs = true
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.address, "10.1.1.1:80");
        assert!(config.observability.json_logs);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.timeouts.request_secs, 30);
    }
}
