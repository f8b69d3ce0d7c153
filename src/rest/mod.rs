// SPDX-License-Identifier: MIT
// rest/mod.rs — health and metrics HTTP responder.
//
// Axum server on the `[http]` bind address (loopback by default). Runs
// concurrently with the reconciler loop; the two share only read-only
// config, the metrics handle, and the storage pool.
//
// Endpoints:
//   GET /health    liveness — always 200 while the process runs
//   GET /ready     readiness — 200 after the first completed cycle
//   GET /metrics   Prometheus text format

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::AppContext;

pub async fn start_http_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.http.bind_address, ctx.config.http.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("health/metrics endpoint listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(ctx)
}

async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.metrics.started_at.elapsed().as_secs();
    let db_ok = ctx.storage.ping().await;
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
        "db_ok": db_ok,
    }))
}

async fn ready(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    if ctx.ready.load(Ordering::Acquire) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "waiting for first cycle")
    }
}

async fn metrics(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        ctx.metrics.render_prometheus(),
    )
}
