// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! IPv4 subnet keys.
//!
//! A client address is masked to the configured prefix length and rendered
//! in CIDR notation (`192.0.2.0/24`). Every address inside the same network
//! maps to the same key, which is what the limiter counts against.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Widest IPv4 prefix.
pub const MAX_PREFIX_LEN: u8 = 32;

/// Why an address could not be turned into a subnet key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid IP address: {0:?}")]
    Invalid(String),

    #[error("Not an IPv4 address: {0}")]
    NotIpv4(String),
}

/// Canonical `network/prefix` string for an IPv4 subnet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubnetKey(String);

impl SubnetKey {
    /// Parse `ip` and mask it to `prefix_len` bits.
    ///
    /// IPv4-mapped IPv6 literals (`::ffff:192.0.2.1`) are unwrapped to their
    /// IPv4 address. Prefix lengths above 32 are clamped.
    pub fn from_ip(ip: &str, prefix_len: u8) -> Result<Self, AddressError> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| AddressError::Invalid(ip.to_string()))?;

        let v4 = match addr {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .ok_or_else(|| AddressError::NotIpv4(ip.to_string()))?,
        };

        Ok(Self::from_ipv4(v4, prefix_len))
    }

    /// Mask an already-parsed address.
    pub fn from_ipv4(addr: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(MAX_PREFIX_LEN);
        let network = Ipv4Addr::from(u32::from(addr) & netmask(prefix_len));
        Self(format!("{}/{}", network, prefix_len))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SubnetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Netmask with the top `prefix_len` bits set.
fn netmask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        n => u32::MAX << (MAX_PREFIX_LEN - n),
    }
}
