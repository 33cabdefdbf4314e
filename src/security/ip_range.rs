//! IPv4 range table and membership test.
//!
//! # Responsibilities
//! - Parse dotted-quad addresses strictly (no trimming, no shorthand forms)
//! - Represent inclusive `[low, high]` ranges as unsigned 32-bit integers
//! - Answer "is this address inside any configured range"
//!
//! # Design Decisions
//! - Parse failure is an explicit error, never a numeric sentinel
//! - Linear scan, first match wins; ranges are not required to be disjoint
//! - Table is immutable once built and shared as `Arc<[IpRange]>`

use std::fmt;
use std::net::{AddrParseError, Ipv4Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building a range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid IPv4 address {value:?}")]
    InvalidAddress {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("range {low} - {high} is inverted (low > high)")]
    Inverted { low: Ipv4Addr, high: Ipv4Addr },
}

/// Parse a dotted-quad string into its 32-bit value, most significant octet first.
pub fn parse_ipv4(value: &str) -> Result<u32, RangeError> {
    Ipv4Addr::from_str(value)
        .map(u32::from)
        .map_err(|source| RangeError::InvalidAddress {
            value: value.to_string(),
            source,
        })
}

/// Inclusive IPv4 interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    low: u32,
    high: u32,
}

impl IpRange {
    /// Build a range from two addresses. Fails if `low > high`.
    pub fn new(low: Ipv4Addr, high: Ipv4Addr) -> Result<Self, RangeError> {
        let (lo, hi) = (u32::from(low), u32::from(high));
        if lo > hi {
            return Err(RangeError::Inverted { low, high });
        }
        Ok(Self { low: lo, high: hi })
    }

    /// Build a range from two dotted-quad strings.
    pub fn parse(low: &str, high: &str) -> Result<Self, RangeError> {
        let low = Ipv4Addr::from(parse_ipv4(low)?);
        let high = Ipv4Addr::from(parse_ipv4(high)?);
        Self::new(low, high)
    }

    pub fn low(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.low)
    }

    pub fn high(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.high)
    }

    /// Inclusive on both ends.
    pub fn contains(&self, value: u32) -> bool {
        self.low <= value && value <= self.high
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.low(), self.high())
    }
}

/// A range as it appears in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RangeEntry {
    pub low: String,
    pub high: String,
}

impl RangeEntry {
    pub fn new(low: impl Into<String>, high: impl Into<String>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
        }
    }
}

impl TryFrom<&RangeEntry> for IpRange {
    type Error = RangeError;

    fn try_from(entry: &RangeEntry) -> Result<Self, Self::Error> {
        IpRange::parse(&entry.low, &entry.high)
    }
}

/// Published ranges of the Jetpack service servers (ARIN org AUTOM-93).
pub const JETPACK_RANGES: [(&str, &str); 15] = [
    ("216.151.209.64", "216.151.209.127"),
    ("66.135.48.128", "66.135.48.255"),
    ("69.174.248.128", "69.174.248.255"),
    ("76.74.255.0", "76.74.255.127"),
    ("216.151.210.0", "216.151.210.127"),
    ("76.74.248.128", "76.74.248.255"),
    ("76.74.254.0", "76.74.254.127"),
    ("207.198.112.0", "207.198.113.255"),
    ("207.198.101.0", "207.198.101.127"),
    ("198.181.116.0", "198.181.119.255"),
    ("192.0.64.0", "192.0.127.25"),
    ("66.155.8.0", "66.155.11.255"),
    ("66.155.38.0", "66.155.38.0"),
    ("72.233.119.192", "72.233.119.255"),
    ("209.15.21.0", "209.15.21.255"),
];

/// The reference table as config entries.
pub fn default_entries() -> Vec<RangeEntry> {
    JETPACK_RANGES
        .iter()
        .map(|(low, high)| RangeEntry::new(*low, *high))
        .collect()
}

/// Compile config entries into a range table, stopping at the first bad entry.
pub fn compile(entries: &[RangeEntry]) -> Result<Vec<IpRange>, RangeError> {
    entries.iter().map(IpRange::try_from).collect()
}

/// Whether `ip` falls inside any of `ranges`.
///
/// An address that does not parse as a dotted quad is never authorized.
pub fn is_authorized(ip: &str, ranges: &[IpRange]) -> bool {
    match parse_ipv4(ip) {
        Ok(value) => ranges.iter().any(|range| range.contains(value)),
        Err(_) => false,
    }
}
