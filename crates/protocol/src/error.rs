//! Fehlertypen fuer das Verzeichnisprotokoll

use rendezvous_core::RendezvousError;
use thiserror::Error;

/// Fehler beim Parsen oder Erzeugen von Protokollnachrichten
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Nachricht enthaelt kein einziges Byte
    #[error("Leere Nachricht")]
    LeereNachricht,

    /// Erstes Byte ist fuer diese Protokollphase kein gueltiger Opcode
    #[error("Unbekannter Opcode {0:#04x}")]
    UnbekannterOpcode(u8),

    /// Nachricht ist kein gueltiges UTF-8
    #[error("Nachricht ist kein gueltiges UTF-8")]
    KeinUtf8,

    /// Zwischen Opcode und Payload fehlt das Leerzeichen
    #[error("Fehlendes Trennzeichen nach dem Opcode")]
    FehlendesTrennzeichen,

    /// Payload hat die falsche Anzahl Felder
    #[error("Ungueltiger Payload: {0}")]
    UngueltigerPayload(String),

    /// Feldwert verletzt eine Domaenenregel (Name, Adresse, Port)
    #[error(transparent)]
    Validierung(#[from] RendezvousError),

    /// Server-Antwort hat nicht das Format `<code><GRUND>[ <ip> <port>]`
    #[error("Ungueltige Antwort: {0}")]
    UngueltigeAntwort(String),

    /// Statuscode ist syntaktisch korrekt aber unbekannt
    #[error("Unbekannter Statuscode: {0}")]
    UnbekannterStatus(u16),
}

impl ProtocolError {
    /// Erstellt einen Payload-Fehler
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::UngueltigerPayload(msg.into())
    }
}

/// Result-Typ fuer das Protokoll
pub type ProtocolResult<T> = Result<T, ProtocolError>;
