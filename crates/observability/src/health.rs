//! Health-Check-Endpunkt fuer Rendezvous
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, Verzeichnisgroesse und
//! offenen Verbindungen

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::RendezvousMetrics;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Verbindungslimit erreicht, neue Clients werden abgewiesen
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub registered_users: i64,
    pub open_connections: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub metriken: RendezvousMetrics,
    pub max_verbindungen: usize,
}

impl HealthState {
    pub fn neu(metriken: RendezvousMetrics, max_verbindungen: usize) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            metriken,
            max_verbindungen,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Erstellt die aktuelle Health-Antwort
    pub fn bericht(&self) -> HealthResponse {
        let offen = self.metriken.open_connections.get();
        let status = if offen >= self.max_verbindungen as i64 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            registered_users: self.metriken.directory_users.get(),
            open_connections: offen,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
///
/// Auch `degraded` liefert 200, die Probe soll nicht fehlschlagen.
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.bericht()))
}
