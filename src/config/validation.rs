//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every range bound parses and `low <= high`
//! - Validate value ranges (timeouts > 0, status codes valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::schema::GuardServerConfig;
use crate::security::ip_range::{IpRange, RangeError};

/// A single semantic problem in a config file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("guard.ranges[{index}]: {reason}")]
    Range { index: usize, reason: RangeError },

    #[error("guard.provider_identity must not be empty")]
    EmptyProviderIdentity,

    #[error("guard.xmlrpc_paths must contain at least one path")]
    NoXmlrpcPaths,

    #[error("guard.xmlrpc_paths entry {0:?} must start with '/'")]
    RelativeXmlrpcPath(String),

    #[error("guard.rejection_status {0} is not a valid HTTP status code")]
    InvalidStatus(u16),

    #[error("upstream.address must not be empty")]
    EmptyUpstream,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,
}

/// Validate a parsed config, collecting every error.
pub fn validate_config(config: &GuardServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let guard = &config.guard;

    for (index, entry) in guard.ranges.iter().enumerate() {
        if let Err(reason) = IpRange::try_from(entry) {
            errors.push(ValidationError::Range { index, reason });
        }
    }

    if guard.provider_identity.is_empty() {
        errors.push(ValidationError::EmptyProviderIdentity);
    }

    if guard.xmlrpc_paths.is_empty() {
        errors.push(ValidationError::NoXmlrpcPaths);
    }
    for path in &guard.xmlrpc_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativeXmlrpcPath(path.clone()));
        }
    }

    if StatusCode::from_u16(guard.rejection_status).is_err() {
        errors.push(ValidationError::InvalidStatus(guard.rejection_status));
    }

    if config.upstream.address.trim().is_empty() {
        errors.push(ValidationError::EmptyUpstream);
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ip_range::RangeEntry;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GuardServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GuardServerConfig::default();
        config.guard.ranges = vec![
            RangeEntry::new("10.0.0.0", "10.0.0.255"),
            RangeEntry::new("10.0.1.9", "10.0.1.1"),
            RangeEntry::new("not-an-ip", "10.0.2.1"),
        ];
        config.guard.provider_identity = String::new();
        config.guard.xmlrpc_paths = vec!["xmlrpc.php".into()];
        config.guard.rejection_status = 42;
        config.timeouts.request_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(matches!(errors[0], ValidationError::Range { index: 1, reason: RangeError::Inverted { .. } }));
        assert!(matches!(errors[1], ValidationError::Range { index: 2, reason: RangeError::InvalidAddress { .. } }));
        assert!(errors.contains(&ValidationError::EmptyProviderIdentity));
        assert!(errors.contains(&ValidationError::RelativeXmlrpcPath("xmlrpc.php".into())));
        assert!(errors.contains(&ValidationError::InvalidStatus(42)));
        assert!(errors.contains(&ValidationError::ZeroTimeout("request_secs")));
    }

    #[test]
    fn test_range_error_names_entry() {
        use std::error::Error;

        let mut config = GuardServerConfig::default();
        config.guard.ranges = vec![RangeEntry::new("10.0.0.300", "10.0.0.1")];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "guard.ranges[0]: invalid IPv4 address \"10.0.0.300\"");
        assert!(errors[0].source().is_none());
    }

    #[test]
    fn test_empty_paths_rejected() {
        let mut config = GuardServerConfig::default();
        config.guard.xmlrpc_paths.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoXmlrpcPaths]));
    }

    #[test]
    fn test_empty_range_table_is_allowed() {
        // An empty table rejects every provider call, which is a valid lockdown.
        let mut config = GuardServerConfig::default();
        config.guard.ranges.clear();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
