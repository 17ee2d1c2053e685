//! # rendezvous-observability
//!
//! Observability-Crate fuer Rendezvous:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{HealthResponse, HealthState, HealthStatus, health_router};
pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
pub use metrics::{RendezvousMetrics, metrics_router};

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

/// Baut den Router mit allen Observability-Endpunkten
pub fn observability_router(metriken: RendezvousMetrics, health: HealthState) -> axum::Router {
    axum::Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health))
        .layer(TraceLayer::new_for_http())
}

/// Startet den Observability-HTTP-Server (Metriken + Health)
///
/// Endpunkte:
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
///
/// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
pub async fn observability_server_starten(
    bind_addr: SocketAddr,
    metriken: RendezvousMetrics,
    health: HealthState,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let app = observability_router(metriken, health);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Observability-Server gestartet");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        })
        .await?;

    tracing::info!("Observability-Server gestoppt");
    Ok(())
}
