// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the subnet rate limiter service.
//!
//! Every path without its own route is rate limited per client subnet. The
//! admin `/reset` route, the health routes and the metrics route bypass the
//! limiter.

use crate::config::Config;
use crate::limiter::{RateLimitResult, SubnetRateLimiter};
use crate::metrics::Metrics;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Body served to admitted requests.
pub const PLACEHOLDER_BODY: &str = "Hello, World!";

/// Shared application state.
pub struct AppState {
    pub limiter: SubnetRateLimiter,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, prometheus::Error> {
        Ok(Self {
            limiter: SubnetRateLimiter::from_config(&config.rate_limit),
            metrics: Metrics::new()?,
            config,
        })
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Query string of the admin reset route.
#[derive(Debug, Deserialize)]
pub struct ResetParams {
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Admin reset response.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub prefix: String,
    pub removed: usize,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/reset", get(reset).post(reset));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.fallback(limited)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "subnet-rate-limiter",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Clear limiter state for every subnet starting with `prefix`.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResetParams>,
) -> Response {
    let prefix = match params.prefix {
        Some(prefix) if !prefix.is_empty() => prefix,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing required parameter: prefix".to_string(),
                    code: "MISSING_PREFIX",
                }),
            )
                .into_response();
        }
    };

    let removed = state.limiter.reset(&prefix);
    state.metrics.record_reset(removed);
    info!(prefix = %prefix, removed, "Subnet counters reset");

    (StatusCode::OK, Json(ResetResponse { prefix, removed })).into_response()
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state
        .metrics
        .set_tracked_subnets(state.limiter.tracked_subnets());

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Rate-limited catch-all.
///
/// The client is the first `X-Forwarded-For` entry, or the TCP peer when the
/// header is absent.
pub async fn limited(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let result = state.limiter.check(&ip);
    state.metrics.record_decision(&result);

    match result {
        RateLimitResult::Allowed { remaining } => {
            debug!(ip = %ip, remaining, "Request allowed");
            (StatusCode::OK, PLACEHOLDER_BODY).into_response()
        }
        RateLimitResult::Limited { reason, retry_after } => {
            debug!(
                ip = %ip,
                reason = %reason,
                retry_after_ms = retry_after.as_millis() as u64,
                "Request rate limited"
            );
            // Clients are always told the full configured cooldown.
            let retry_secs = state.limiter.cooldown().as_secs();
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                "Too Many Requests",
            )
                .into_response()
        }
    }
}

/// Pick the client address string handed to the limiter.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    match headers.get("x-forwarded-for") {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .map(|ip| ip.trim().to_string())
            .unwrap_or_default(),
        None => peer.map(|addr| addr.ip().to_string()).unwrap_or_default(),
    }
}
