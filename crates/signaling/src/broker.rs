//! Vermittlung zwischen Clients
//!
//! Reine Logik ueber einer gesperrten `UserTable`: ein Aufrufer haelt den
//! Verzeichnis-Lock (`Directory::transaktion`) und ruft diese Funktionen
//! darin auf. Dadurch sehen Nachschlagen und Aendern denselben Zustand.

use rendezvous_core::{Endpoint, Username};
use rendezvous_protocol::StatusResponse;

use crate::directory::UserTable;
use crate::error::{DirectoryError, DirectoryResult};

/// Ergebnis einer CONNECT-Vermittlung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vermittlung {
    /// Ziel lauscht, Anfrager steht jetzt auf `Connecting`
    Verbunden(Endpoint),
    /// Ziel existiert nicht oder lauscht nicht; Anfrager wurde entfernt
    ZielNichtGefunden,
    /// Der Anfrager selbst ist nicht (mehr) registriert
    AnfragerUnbekannt,
}

impl Vermittlung {
    /// Status-Antwort an den Anfrager
    pub fn antwort(&self) -> StatusResponse {
        match self {
            Self::Verbunden(e) => StatusResponse::verbunden(*e),
            Self::ZielNichtGefunden | Self::AnfragerUnbekannt => StatusResponse::not_found(),
        }
    }
}

/// Loest den Chat-Endpunkt eines Benutzers auf
///
/// Nur ein lauschender Benutzer hat einen Endpunkt; alle anderen gelten
/// als nicht gefunden.
pub fn resolve(tabelle: &UserTable, ziel: &str) -> DirectoryResult<Endpoint> {
    tabelle
        .find(ziel)
        .and_then(|u| u.endpoint())
        .ok_or_else(|| DirectoryError::NichtGefunden(ziel.to_string()))
}

/// Traegt den angekuendigten Endpunkt des Anfragers ein (LISTEN)
pub fn ankuendigen(
    tabelle: &mut UserTable,
    anfrager: &str,
    endpoint: Endpoint,
) -> DirectoryResult<()> {
    tabelle.set_listening(anfrager, endpoint)
}

/// Vermittelt eine CONNECT-Anfrage von `anfrager` an `ziel`
///
/// Bei Erfolg wird der Anfrager auf `Connecting { peer: ziel }` gesetzt,
/// sonst aus dem Verzeichnis entfernt. Der Zustand des Ziels bleibt in
/// beiden Faellen unveraendert.
pub fn vermitteln(tabelle: &mut UserTable, anfrager: &str, ziel: &Username) -> Vermittlung {
    if tabelle.find(anfrager).is_none() {
        return Vermittlung::AnfragerUnbekannt;
    }

    match resolve(tabelle, ziel.as_str()) {
        Ok(endpoint) => match tabelle.set_connecting(anfrager, ziel.clone()) {
            Ok(()) => Vermittlung::Verbunden(endpoint),
            Err(_) => Vermittlung::AnfragerUnbekannt,
        },
        Err(_) => {
            tabelle.remove(anfrager);
            Vermittlung::ZielNichtGefunden
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
