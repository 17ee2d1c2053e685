//! Prometheus-kompatible Metriken fuer Rendezvous
//!
//! Registrierte Metriken:
//! - `rendezvous_registrations_total` – Counter: Erfolgreiche REGISTER
//! - `rendezvous_conflicts_total` – Counter: REGISTER mit belegtem Namen
//! - `rendezvous_unregistrations_total` – Counter: UNREGISTER (label `ergebnis`)
//! - `rendezvous_listens_total` – Counter: Erfolgreiche LISTEN
//! - `rendezvous_connects_total` – Counter: CONNECT (label `ergebnis`)
//! - `rendezvous_bad_requests_total` – Counter: Fehlerhafte Nachrichten
//! - `rendezvous_rejected_connections_total` – Counter: Ueber dem Verbindungslimit
//! - `rendezvous_open_connections` – Gauge: Offene TCP-Verbindungen
//! - `rendezvous_directory_users` – Gauge: Registrierte Benutzer
//! - `rendezvous_bytes_received_total` / `rendezvous_bytes_sent_total` – Counter

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Rendezvous-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metriken.
#[derive(Clone)]
pub struct RendezvousMetrics {
    pub registry: Arc<Registry>,

    // Protokoll-Metriken
    pub registrations_total: IntCounter,
    pub conflicts_total: IntCounter,
    pub unregistrations_total: IntCounterVec,
    pub listens_total: IntCounter,
    pub connects_total: IntCounterVec,
    pub bad_requests_total: IntCounter,

    // Verbindungs-Metriken
    pub rejected_connections_total: IntCounter,
    pub open_connections: IntGauge,
    pub directory_users: IntGauge,
    pub bytes_received_total: IntCounter,
    pub bytes_sent_total: IntCounter,
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let c = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn messwert(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let g = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

impl RendezvousMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Protokoll-Metriken ---
        let registrations_total = zaehler(
            &registry,
            "rendezvous_registrations_total",
            "Anzahl erfolgreicher Registrierungen",
        )?;
        let conflicts_total = zaehler(
            &registry,
            "rendezvous_conflicts_total",
            "Anzahl abgelehnter Registrierungen (Name belegt)",
        )?;

        let unregistrations_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_unregistrations_total",
                "Anzahl Abmeldungen nach Ergebnis",
            ),
            &["ergebnis"],
        )?;
        registry.register(Box::new(unregistrations_total.clone()))?;

        let listens_total = zaehler(
            &registry,
            "rendezvous_listens_total",
            "Anzahl angekuendigter Chat-Endpunkte",
        )?;

        let connects_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_connects_total",
                "Anzahl Verbindungsanfragen nach Ergebnis",
            ),
            &["ergebnis"],
        )?;
        registry.register(Box::new(connects_total.clone()))?;

        let bad_requests_total = zaehler(
            &registry,
            "rendezvous_bad_requests_total",
            "Anzahl fehlerhafter Nachrichten",
        )?;

        // --- Verbindungs-Metriken ---
        let rejected_connections_total = zaehler(
            &registry,
            "rendezvous_rejected_connections_total",
            "Verbindungen die wegen des Limits abgelehnt wurden",
        )?;
        let open_connections = messwert(
            &registry,
            "rendezvous_open_connections",
            "Aktuell offene TCP-Verbindungen",
        )?;
        let directory_users = messwert(
            &registry,
            "rendezvous_directory_users",
            "Aktuell registrierte Benutzer",
        )?;
        let bytes_received_total = zaehler(
            &registry,
            "rendezvous_bytes_received_total",
            "Empfangene Bytes inklusive Terminator",
        )?;
        let bytes_sent_total = zaehler(
            &registry,
            "rendezvous_bytes_sent_total",
            "Gesendete Bytes inklusive Terminator",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            registrations_total,
            conflicts_total,
            unregistrations_total,
            listens_total,
            connects_total,
            bad_requests_total,
            rejected_connections_total,
            open_connections,
            directory_users,
            bytes_received_total,
            bytes_sent_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RendezvousMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RendezvousMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
