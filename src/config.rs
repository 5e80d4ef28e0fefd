// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the subnet rate limiter.
//!
//! Settings come from environment variables. Anything malformed is a
//! [`ConfigError`]; the service refuses to start rather than falling back to
//! a default.

use crate::subnet::MAX_PREFIX_LEN;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {var}: {value:?} is not a valid {expected}")]
    Malformed {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid PREFIX_LEN: {0} exceeds 32")]
    PrefixLenOutOfRange(u8),

    #[error("Invalid LIMIT: must be at least 1")]
    ZeroLimit,

    #[error("Invalid METRICS_PATH: {0:?}")]
    MetricsPath(String),
}

/// Configuration for the subnet rate limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Per-subnet limiter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Subnet prefix length in bits (default: 24)
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    /// Requests admitted per subnet before cooldown (default: 100)
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Cooldown in nanoseconds once the limit is hit (default: 1m)
    #[serde(default = "default_cooldown_ns")]
    pub cooldown_ns: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_prefix_len() -> u8 {
    24
}

fn default_limit() -> u32 {
    100
}

fn default_cooldown_ns() -> u64 {
    60_000_000_000 // 1m
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            prefix_len: default_prefix_len(),
            limit: default_limit(),
            cooldown_ns: default_cooldown_ns(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the cooldown duration
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_nanos(self.cooldown_ns)
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// raw value. Unset and blank values fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(v) = get("PREFIX_LEN") {
            config.rate_limit.prefix_len = parse_var("PREFIX_LEN", &v, "prefix length")?;
        }
        if let Some(v) = get("LIMIT") {
            config.rate_limit.limit = parse_var("LIMIT", &v, "request count")?;
        }
        if let Some(v) = get("COOLDOWN") {
            let cooldown = parse_duration(&v).ok_or_else(|| ConfigError::Malformed {
                var: "COOLDOWN",
                value: v.clone(),
                expected: "duration",
            })?;
            config.rate_limit.cooldown_ns =
                u64::try_from(cooldown.as_nanos()).map_err(|_| ConfigError::Malformed {
                    var: "COOLDOWN",
                    value: v.clone(),
                    expected: "duration",
                })?;
        }
        if let Some(v) = get("METRICS_ENABLED") {
            config.metrics.enabled = parse_var("METRICS_ENABLED", &v, "boolean")?;
        }
        if let Some(path) = get("METRICS_PATH") {
            config.metrics.path = path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the limiter and router rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.prefix_len > MAX_PREFIX_LEN {
            return Err(ConfigError::PrefixLenOutOfRange(self.rate_limit.prefix_len));
        }
        if self.rate_limit.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Malformed {
                var: "BIND_ADDR",
                value: self.bind_addr.clone(),
                expected: "socket address",
            });
        }
        let path = self.metrics.path.as_str();
        if !path.starts_with('/')
            || path.contains(['*', ':', '{', '}'])
            || matches!(path, "/" | "/reset" | "/health" | "/healthz")
        {
            return Err(ConfigError::MetricsPath(self.metrics.path.clone()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Malformed {
        var,
        value: value.to_string(),
        expected,
    })
}

/// Parse a duration such as `1m`, `1m30s`, `1.5s` or `250ms`.
///
/// Accepts a sequence of decimal numbers, each followed by one of the units
/// `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. A bare `0` is zero. A leading `+`
/// is allowed; negative durations are not.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = s;

    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_end);
        if number.is_empty() || number == "." {
            return None;
        }
        let value: f64 = number.parse().ok()?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return None,
        };

        total_nanos += value * scale;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}
