//! Offline address check behind `xmlrpc-guard check <IP>`.

use std::fmt;
use std::process::ExitCode;

use crate::config::GuardServerConfig;
use crate::security::{AccessGuard, RangeError};

/// Result of checking one address against the configured ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub ip: String,
    pub authorized: bool,
}

impl CheckOutcome {
    /// 0 when authorized, 1 otherwise (malformed addresses included).
    pub fn exit_status(&self) -> u8 {
        if self.authorized {
            0
        } else {
            1
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.authorized {
            write!(f, "{}: authorized", self.ip)
        } else {
            write!(f, "{}: not authorized", self.ip)
        }
    }
}

/// Check `ip` against the guard ranges of `config`.
pub fn check_address(config: &GuardServerConfig, ip: &str) -> Result<CheckOutcome, RangeError> {
    let guard = AccessGuard::from_entries(config.guard.provider_identity.clone(), &config.guard.ranges)?;

    Ok(CheckOutcome {
        ip: ip.to_string(),
        authorized: guard.is_authorized(ip),
    })
}
