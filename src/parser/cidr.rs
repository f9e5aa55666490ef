//! IPv4 CIDR range arithmetic

use ipnetwork::Ipv4Network;
use std::str::FromStr;
use thiserror::Error;

/// Inclusive numeric bounds of an IPv4 CIDR block.
///
/// `start` is the integer value of the written address (host bits are not
/// masked), `end` is `start + 2^(32 - prefix) - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    pub start: u64,
    pub end: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrError {
    #[error("empty network")]
    Empty,

    /// Not exactly one `/`
    #[error("network must be written as address/prefix")]
    Separator,

    #[error("invalid network: {0}")]
    Invalid(String),
}

impl IpRange {
    /// Number of addresses in the range
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl FromStr for IpRange {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CidrError::Empty);
        }
        if s.matches('/').count() != 1 {
            return Err(CidrError::Separator);
        }

        let network = Ipv4Network::from_str(s).map_err(|e| CidrError::Invalid(e.to_string()))?;
        let start = u64::from(u32::from(network.ip()));
        let end = start + (1u64 << (32 - u32::from(network.prefix()))) - 1;

        Ok(IpRange { start, end })
    }
}
