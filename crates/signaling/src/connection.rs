//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Sie liest Frames ueber den `FrameCodec`, reicht sie an die
//! `Session` weiter und schreibt deren Antworten zurueck.
//!
//! ## Ablauf
//! ```text
//! Frame lesen (mit Timeout) -> Session::eingabe -> Antwort senden
//!     ^                                               |
//!     +---------- solange Session nicht Done ---------+
//! ```
//!
//! Timeout, Verbindungsabbruch und Shutdown beenden die Verbindung ohne
//! Aenderung am Verzeichnis.

use futures_util::{SinkExt, StreamExt};
use rendezvous_protocol::{wire::FrameCodec, StatusResponse};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;
use crate::session::{Session, SessionEvent};

// ---------------------------------------------------------------------------
// Byte-Zaehler
// ---------------------------------------------------------------------------

/// Empfangene und gesendete Bytes einer Verbindung (inklusive Terminator)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ByteZaehler {
    pub empfangen: usize,
    pub gesendet: usize,
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Fuehrt die Verbindung bis zum Ende der Session
    ///
    /// Laeuft bis die Session `Done` erreicht, der Client trennt, der
    /// Lese-Timeout ablaeuft oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> ByteZaehler {
        let peer_addr = self.peer_addr;
        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let mut zaehler = ByteZaehler::default();
        match self.sitzung_fuehren(stream, shutdown_rx, &mut zaehler).await {
            Ok(()) => tracing::debug!(peer = %peer_addr, "Session abgeschlossen"),
            Err(SignalingError::VerbindungGetrennt) => {
                tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt")
            }
            Err(SignalingError::Timeout) => {
                tracing::warn!(peer = %peer_addr, "Lese-Timeout, Verbindung wird getrennt")
            }
            Err(SignalingError::Herunterfahren) => {
                tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt")
            }
            Err(e) => tracing::warn!(peer = %peer_addr, fehler = %e, "Verbindungsfehler"),
        }

        tracing::trace!(
            peer = %peer_addr,
            empfangen = zaehler.empfangen,
            gesendet = zaehler.gesendet,
            "Bytes uebertragen"
        );
        self.state
            .metriken
            .bytes_received_total
            .inc_by(zaehler.empfangen as u64);
        self.state
            .metriken
            .bytes_sent_total
            .inc_by(zaehler.gesendet as u64);

        self.verzeichnis_protokollieren();
        tracing::info!(peer = %peer_addr, "Verbindungs-Task beendet");
        zaehler
    }

    async fn sitzung_fuehren(
        &self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
        zaehler: &mut ByteZaehler,
    ) -> SignalingResult<()> {
        let config = &self.state.config;
        let lese_timeout = config.lese_timeout();
        let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_nachricht_bytes));
        let mut session = Session::neu(self.state.directory.clone());

        tracing::debug!(peer = %self.peer_addr, session = %session.id(), "Session gestartet");

        while !session.ist_beendet() {
            let frame = tokio::select! {
                gelesen = tokio::time::timeout(lese_timeout, framed.next()) => {
                    match gelesen {
                        Err(_) => return Err(SignalingError::Timeout),
                        Ok(None) => return Err(SignalingError::VerbindungGetrennt),
                        Ok(Some(Err(e))) if e.kind() == io::ErrorKind::InvalidData => {
                            // Zu grosse Nachricht gilt als fehlerhafte Nachricht
                            self.state.metriken.bad_requests_total.inc();
                            senden(&mut framed, StatusResponse::bad_request(), zaehler).await?;
                            return Err(SignalingError::protokoll(e.to_string()));
                        }
                        Ok(Some(Err(e))) => return Err(e.into()),
                        Ok(Some(Ok(frame))) => frame,
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return Err(SignalingError::Herunterfahren);
                    }
                    continue;
                }
            };

            zaehler.empfangen = framed.codec().dekodierte_bytes();
            tracing::trace!(peer = %self.peer_addr, bytes = frame.len(), "Nachricht empfangen");

            let event = session.eingabe(&frame);
            self.ereignis_erfassen(&event);

            if let Some(antwort) = session.ausgabe_nehmen() {
                senden(&mut framed, antwort, zaehler).await?;
            }
        }

        Ok(())
    }

    /// Protokolliert und zaehlt das Ergebnis einer Eingabe
    fn ereignis_erfassen(&self, event: &SessionEvent) {
        let m = &self.state.metriken;
        let peer = self.peer_addr;

        match event {
            SessionEvent::Registriert(_) => m.registrations_total.inc(),
            SessionEvent::Konflikt(username) => {
                tracing::info!(peer = %peer, username = %username, "Benutzername bereits vergeben");
                m.conflicts_total.inc();
            }
            SessionEvent::Abgemeldet(_) => {
                m.unregistrations_total.with_label_values(&["ok"]).inc()
            }
            SessionEvent::AbmeldungNichtGefunden(username) => {
                tracing::info!(peer = %peer, username = %username, "Abmeldung fuer unbekannten Benutzer");
                m.unregistrations_total
                    .with_label_values(&["nicht_gefunden"])
                    .inc();
            }
            SessionEvent::Lauscht { username, endpoint } => {
                tracing::info!(peer = %peer, username = %username, endpoint = %endpoint, "Benutzer lauscht");
                m.listens_total.inc();
            }
            SessionEvent::Verbunden {
                username,
                ziel,
                endpoint,
            } => {
                tracing::info!(
                    peer = %peer,
                    username = %username,
                    ziel = %ziel,
                    endpoint = %endpoint,
                    "Verbindung vermittelt"
                );
                m.connects_total.with_label_values(&["ok"]).inc();
            }
            SessionEvent::ZielNichtGefunden { username, ziel } => {
                tracing::info!(
                    peer = %peer,
                    username = %username,
                    ziel = %ziel,
                    "Ziel nicht gefunden, Anfrager entfernt"
                );
                m.connects_total
                    .with_label_values(&["nicht_gefunden"])
                    .inc();
            }
            SessionEvent::AnfragerVerschwunden(username) => {
                tracing::warn!(peer = %peer, username = %username, "Anfrager nicht mehr registriert");
            }
            SessionEvent::Fehlerhaft(e) => {
                tracing::warn!(peer = %peer, fehler = %e, "Fehlerhafte Nachricht");
                m.bad_requests_total.inc();
            }
            SessionEvent::Ignoriert => {}
        }
    }

    /// Gibt den Inhalt des Verzeichnisses aus
    fn verzeichnis_protokollieren(&self) {
        let benutzer = self.state.directory.enumerate();
        for user in &benutzer {
            tracing::debug!(
                username = %user.username,
                operation = %user.operation,
                registriert_am = %user.registered_at,
                "Registrierter Benutzer"
            );
        }
        tracing::info!(anzahl = benutzer.len(), "Registrierte Benutzer insgesamt");
        self.state.metriken.directory_users.set(benutzer.len() as i64);
    }
}

async fn senden(
    framed: &mut Framed<TcpStream, FrameCodec>,
    antwort: StatusResponse,
    zaehler: &mut ByteZaehler,
) -> SignalingResult<()> {
    let text = antwort.encode();
    framed.send(text.as_str()).await?;
    zaehler.gesendet += text.len() + 1;
    Ok(())
}
