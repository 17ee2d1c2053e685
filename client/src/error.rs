//! Fehlertypen des Clients

use rendezvous_protocol::{ProtocolError, Status};
use thiserror::Error;

/// Fehler die bei Verzeichnis- oder Chat-Verbindungen auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP-Verbindung fehlgeschlagen
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Antwort des Servers nicht lesbar
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Server hat die Anfrage mit einem Fehlerstatus beantwortet
    #[error("Server lehnt {anfrage} ab: {status}")]
    Abgelehnt {
        anfrage: &'static str,
        status: Status,
    },

    /// Gegenstelle hat die Verbindung geschlossen
    #[error("Verbindung von der Gegenstelle getrennt")]
    VerbindungGetrennt,

    /// Antwort passt nicht zur Anfrage
    #[error("Unerwartete Antwort: {0}")]
    UnerwarteteAntwort(String),
}

/// Result-Typ des Clients
pub type ClientResult<T> = Result<T, ClientError>;
