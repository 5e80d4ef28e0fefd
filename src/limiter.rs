// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-subnet counter with cooldown.
//!
//! Each IPv4 subnet gets `limit` admitted requests. The next request arms a
//! cooldown and is rejected; every request during the cooldown is rejected
//! too. Once the cooldown has passed the subnet starts a fresh window.
//!
//! Count and cooldown live in one entry behind one lock, so a check-then-act
//! on a key is a single transaction and `reset` never exposes half-cleared
//! state.

use crate::config::RateLimitConfig;
use crate::subnet::SubnetKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Admissions left before the subnet hits its limit
        remaining: u32,
    },
    /// Request is rejected
    Limited {
        /// Reason for rejection
        reason: RateLimitReason,
        /// Time until the subnet is admitted again
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Reason for rejecting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Client address could not be parsed as IPv4
    InvalidAddress,
    /// Subnet used up its limit; this call armed the cooldown
    LimitExceeded,
    /// Subnet is cooling down
    Cooldown,
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "Invalid client address"),
            Self::LimitExceeded => write!(f, "Subnet request limit exceeded"),
            Self::Cooldown => write!(f, "Subnet in cooldown"),
        }
    }
}

/// Counter state for one subnet.
#[derive(Debug, Default)]
struct SubnetState {
    /// Admitted requests in the current window
    count: u32,
    /// When cooldown ends, if one was armed
    cooldown_until: Option<Instant>,
}

/// Thread-safe per-subnet rate limiter.
pub struct SubnetRateLimiter {
    prefix_len: u8,
    limit: u32,
    cooldown: Duration,
    subnets: Mutex<HashMap<String, SubnetState>>,
}

impl SubnetRateLimiter {
    /// Create a limiter. Parameters are expected to be validated already
    /// (see [`Config::validate`](crate::config::Config::validate)).
    pub fn new(prefix_len: u8, limit: u32, cooldown: Duration) -> Self {
        Self {
            prefix_len,
            limit,
            cooldown,
            subnets: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.prefix_len, config.limit, config.cooldown_duration())
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Admit or reject a request from `ip`.
    ///
    /// Unparseable or non-IPv4 input is rejected and leaves state untouched.
    pub fn allow(&self, ip: &str) -> bool {
        self.check(ip).is_allowed()
    }

    /// Like [`allow`](Self::allow), but says why a request was rejected.
    pub fn check(&self, ip: &str) -> RateLimitResult {
        let key = match SubnetKey::from_ip(ip, self.prefix_len) {
            Ok(key) => key,
            Err(_) => {
                return RateLimitResult::Limited {
                    reason: RateLimitReason::InvalidAddress,
                    retry_after: Duration::ZERO,
                }
            }
        };

        let mut subnets = self.subnets.lock();
        let now = Instant::now();

        if let Some(state) = subnets.get(key.as_str()) {
            if let Some(until) = state.cooldown_until {
                if now < until {
                    return RateLimitResult::Limited {
                        reason: RateLimitReason::Cooldown,
                        retry_after: until - now,
                    };
                }
            }
        }

        let state = subnets.entry(key.into_string()).or_default();

        if state.count >= self.limit {
            state.cooldown_until = Some(now + self.cooldown);
            state.count = 0;
            return RateLimitResult::Limited {
                reason: RateLimitReason::LimitExceeded,
                retry_after: self.cooldown,
            };
        }

        state.count += 1;
        RateLimitResult::Allowed {
            remaining: self.limit.saturating_sub(state.count),
        }
    }

    /// Forget every subnet whose key starts with `prefix`.
    ///
    /// Matching is textual, so `"10.1"` matches both `10.1.0.0/16` and
    /// `10.10.0.0/16`. Returns how many entries were removed.
    pub fn reset(&self, prefix: &str) -> usize {
        let mut subnets = self.subnets.lock();
        let before = subnets.len();
        subnets.retain(|key, _| !key.starts_with(prefix));
        before - subnets.len()
    }

    /// Number of subnets currently tracked.
    pub fn tracked_subnets(&self) -> usize {
        self.subnets.lock().len()
    }
}
