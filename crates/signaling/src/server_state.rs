//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Konfiguration, Verzeichnis und Metriken als Arc-geteilte Werte,
//! die sicher zwischen tokio-Tasks geteilt werden koennen.

use rendezvous_observability::RendezvousMetrics;
use rendezvous_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;
use std::time::Duration;

use crate::directory::Directory;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige TCP-Verbindungen
    pub max_verbindungen: usize,
    /// Lese-Timeout pro Nachricht in Sekunden
    pub lese_timeout_sek: u64,
    /// Maximale Nachrichtengroesse ohne Terminator
    pub max_nachricht_bytes: usize,
}

impl SignalingConfig {
    pub fn lese_timeout(&self) -> Duration {
        Duration::from_secs(self.lese_timeout_sek)
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 512,
            lese_timeout_sek: 30,
            max_nachricht_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Benutzerverzeichnis
    pub directory: Directory,
    /// Prometheus-Metriken (Uptime fuehrt `HealthState`)
    pub metriken: RendezvousMetrics,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState mit leerem Verzeichnis
    pub fn neu(config: SignalingConfig, metriken: RendezvousMetrics) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            directory: Directory::neu(),
            metriken,
        })
    }
}
