// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Subnet Rate Limiter
//!
//! Request rate limiting keyed by IPv4 subnet:
//!
//! - Client addresses are masked to a configurable prefix length (/24 default)
//! - Each subnet gets a fixed number of admitted requests
//! - Exceeding the limit blocks the whole subnet for a cooldown period
//! - An admin reset clears counters for subnets matching a textual prefix

pub mod config;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod subnet;

pub use config::{Config, ConfigError};
pub use limiter::{RateLimitReason, RateLimitResult, SubnetRateLimiter};
pub use subnet::{AddressError, SubnetKey};
