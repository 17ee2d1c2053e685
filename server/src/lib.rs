//! rendezvous-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Signaling-Server und Observability und
//! stellt den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use rendezvous_observability::{HealthState, RendezvousMetrics, observability_server_starten};
use rendezvous_signaling::{SignalingServer, SignalingState};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den gebundenen Server zusammen
pub struct Server {
    pub config: ServerConfig,
    signaling: SignalingServer,
    metriken: RendezvousMetrics,
}

impl Server {
    /// Erstellt Zustand und Metriken und bindet den TCP-Socket
    pub async fn binden(config: ServerConfig) -> Result<Self> {
        let metriken = RendezvousMetrics::neu().context("Metriken-Initialisierung fehlgeschlagen")?;
        let state = SignalingState::neu(config.signaling_config(), metriken.clone());

        let adresse = config.tcp_bind_adresse()?;
        let signaling = SignalingServer::binden(state, adresse)
            .await
            .with_context(|| format!("TCP-Socket {adresse} konnte nicht gebunden werden"))?;

        Ok(Self {
            config,
            signaling,
            metriken,
        })
    }

    /// Tatsaechlich gebundene TCP-Adresse
    pub fn lokale_adresse(&self) -> Result<SocketAddr> {
        Ok(self.signaling.lokale_adresse()?)
    }

    /// Geteilter Zustand (Verzeichnis, Konfiguration)
    pub fn state(&self) -> Arc<SignalingState> {
        Arc::clone(self.signaling.state())
    }

    /// Laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.starten_bis(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht registriert werden");
            }
        })
        .await
    }

    /// Startet alle Subsysteme und laeuft bis `signal` fertig ist
    ///
    /// Reihenfolge:
    /// 1. Observability-Server (falls aktiviert)
    /// 2. TCP-Accept-Loop
    /// 3. Auf Signal warten, dann Shutdown an alle Tasks
    pub async fn starten_bis(self, signal: impl Future<Output = ()>) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            tcp = %self.lokale_adresse()?,
            observability = self.config.observability.aktiviert,
            "Server startet"
        );

        let observability_task = if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let health = HealthState::neu(self.metriken.clone(), self.config.sitzung.max_verbindungen);
            let metriken = self.metriken.clone();
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(adresse, metriken, health, rx).await {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            None
        };

        let mut signaling_task = tokio::spawn(self.signaling.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::select! {
            _ = signal => {
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
            ergebnis = &mut signaling_task => {
                // Accept-Loop endet nur bei Fehlern von selbst
                let _ = shutdown_tx.send(true);
                ergebnis.context("Signaling-Task abgebrochen")??;
                return Ok(());
            }
        }

        let _ = shutdown_tx.send(true);
        signaling_task.await.context("Signaling-Task abgebrochen")??;
        if let Some(task) = observability_task {
            task.await.context("Observability-Task abgebrochen")?;
        }

        tracing::info!("Server beendet");
        Ok(())
    }
}
