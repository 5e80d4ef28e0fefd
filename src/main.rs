// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Subnet Rate Limiter Service
//!
//! Rate limits HTTP requests per client IPv4 subnet and serves a placeholder
//! body to admitted requests.
//!
//! ## Routes
//!
//! - `/reset?prefix=<p>`: clear counters for subnets whose key starts with `p`
//! - `/health`, `/healthz`: liveness
//! - `/metrics`: Prometheus metrics
//! - anything else: rate limited, `429` with `Retry-After` when blocked
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables. Invalid values abort
//! startup.
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `PREFIX_LEN`: Subnet prefix length in bits (default: 24)
//! - `LIMIT`: Requests per subnet before cooldown (default: 100)
//! - `COOLDOWN`: Cooldown duration, e.g. `30s`, `1m30s` (default: 1m)
//! - `METRICS_ENABLED`: Serve Prometheus metrics (default: true)
//! - `METRICS_PATH`: Metrics route (default: /metrics)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subnet_rate_limiter::{
    config::Config,
    handlers::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        prefix_len = config.rate_limit.prefix_len,
        limit = config.rate_limit.limit,
        cooldown = ?config.rate_limit.cooldown_duration(),
        metrics_enabled = config.metrics.enabled,
        "Starting subnet rate limiter"
    );

    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
