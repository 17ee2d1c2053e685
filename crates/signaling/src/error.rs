//! Fehlertypen fuer den Signaling-Service

use rendezvous_protocol::ProtocolError;
use thiserror::Error;

/// Fehler des Benutzerverzeichnisses
///
/// Beide Varianten sind gueltige Protokollergebnisse (409 bzw. 404) und
/// keine Serverfehler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Benutzername ist bereits registriert
    #[error("Benutzer bereits registriert: {0}")]
    Konflikt(String),

    /// Benutzer existiert nicht
    #[error("Benutzer nicht gefunden: {0}")]
    NichtGefunden(String),
}

/// Result-Typ fuer Verzeichnisoperationen
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Protokollfehler (ungueltige Nachricht, zu gross)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Verzeichnisfehler
    #[error(transparent)]
    Verzeichnis(#[from] DirectoryError),

    /// Verbindung wurde vom Client getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Keine Nachricht innerhalb des Lese-Timeouts
    #[error("Timeout")]
    Timeout,

    /// Server faehrt herunter
    #[error("Server wird heruntergefahren")]
    Herunterfahren,
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

impl From<ProtocolError> for SignalingError {
    fn from(e: ProtocolError) -> Self {
        Self::Protokoll(e.to_string())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
