// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for limiter decisions and resets.

use crate::limiter::{RateLimitReason, RateLimitResult};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Limiter metrics, registered in a registry owned by this struct.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    decisions: IntCounterVec,
    resets: IntCounter,
    reset_entries: IntCounter,
    tracked_subnets: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "subnet_limiter_decisions_total",
                "Rate limit decisions by outcome",
            ),
            &["decision"],
        )?;
        let resets = IntCounter::new(
            "subnet_limiter_resets_total",
            "Admin reset requests served",
        )?;
        let reset_entries = IntCounter::new(
            "subnet_limiter_reset_entries_total",
            "Subnet entries removed by admin resets",
        )?;
        let tracked_subnets = IntGauge::new(
            "subnet_limiter_tracked_subnets",
            "Subnets currently held in limiter state",
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(resets.clone()))?;
        registry.register(Box::new(reset_entries.clone()))?;
        registry.register(Box::new(tracked_subnets.clone()))?;

        Ok(Self {
            registry,
            decisions,
            resets,
            reset_entries,
            tracked_subnets,
        })
    }

    /// Count one limiter decision.
    pub fn record_decision(&self, result: &RateLimitResult) {
        let label = match result {
            RateLimitResult::Allowed { .. } => "allowed",
            RateLimitResult::Limited { reason, .. } => match reason {
                RateLimitReason::LimitExceeded => "limited",
                RateLimitReason::Cooldown => "cooldown",
                RateLimitReason::InvalidAddress => "invalid_address",
            },
        };
        self.decisions.with_label_values(&[label]).inc();
    }

    pub fn record_reset(&self, removed: usize) {
        self.resets.inc();
        self.reset_entries.inc_by(removed as u64);
    }

    pub fn set_tracked_subnets(&self, count: usize) {
        self.tracked_subnets.set(count as i64);
    }

    pub fn decision_count(&self, decision: &str) -> u64 {
        self.decisions.with_label_values(&[decision]).get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
