//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.
//!
//! ## Concurrency-Modell
//! Verbindungs-Tasks laufen parallel auf dem Multi-Thread-Runtime. Der
//! einzige geteilte Zustand ist das `Directory` hinter einem Lock. Die
//! Anzahl gleichzeitiger Verbindungen ist ueber einen atomaren Zaehler
//! begrenzt.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::connection::ClientConnection;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
///
/// Wird mit `binden` erzeugt; der Socket ist danach bereits gebunden, so
/// dass die tatsaechliche Adresse (z.B. bei Port 0) abgefragt werden kann.
/// Offene Verbindungen sind von aussen ueber den Gauge `open_connections`
/// sichtbar.
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
    aktive_verbindungen: Arc<AtomicUsize>,
}

impl SignalingServer {
    /// Bindet den TCP-Socket
    pub async fn binden(state: Arc<SignalingState>, bind_addr: SocketAddr) -> SignalingResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            state,
            listener,
            aktive_verbindungen: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> SignalingResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Gibt den geteilten Server-Zustand zurueck
    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(
        self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let lokale_addr = self.lokale_adresse()?;
        let max_verbindungen = self.state.config.max_verbindungen;

        tracing::info!(
            adresse = %lokale_addr,
            max_verbindungen,
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let aktiv = self.aktive_verbindungen.fetch_add(1, Ordering::SeqCst);
                            if aktiv >= max_verbindungen {
                                self.aktive_verbindungen.fetch_sub(1, Ordering::SeqCst);
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = max_verbindungen,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                self.state.metriken.rejected_connections_total.inc();
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, aktiv = aktiv + 1, "Verbindung akzeptiert");
                            self.state.metriken.open_connections.inc();

                            let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();
                            let zaehler = Arc::clone(&self.aktive_verbindungen);
                            let state = Arc::clone(&self.state);

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                                zaehler.fetch_sub(1, Ordering::SeqCst);
                                state.metriken.open_connections.dec();
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            registrierte_benutzer = self.state.directory.len(),
            "TCP Signaling-Server gestoppt"
        );
        Ok(())
    }
}
