//! Benutzerverzeichnis – Wer ist registriert und was tut er gerade?
//!
//! `UserTable` ist die eigentliche Tabelle (ohne Synchronisation),
//! `Directory` teilt sie zwischen allen Verbindungs-Tasks. Saemtliche
//! Zugriffe laufen ueber einen einzigen Lock, damit REGISTER auf denselben
//! Namen von zwei Verbindungen nie beide erfolgreich sein kann und ein
//! CONNECT (nachschlagen + Anfrager aendern) atomar bleibt.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rendezvous_core::{Endpoint, Username};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DirectoryError, DirectoryResult};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Aktuelle Operation eines registrierten Benutzers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Operation {
    /// Registriert, aber noch keine Operation angekuendigt
    #[default]
    None,
    /// Lauscht fuer eingehende Chats unter diesem Endpunkt
    Listening(Endpoint),
    /// Hat eine Verbindung zu `peer` angefragt
    Connecting { peer: Username },
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("keine"),
            Self::Listening(e) => write!(f, "lauscht auf {e}"),
            Self::Connecting { peer } => write!(f, "verbindet zu {peer}"),
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Eintrag im Verzeichnis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: Username,
    pub operation: Operation,
    pub registered_at: DateTime<Utc>,
}

impl User {
    fn neu(username: Username) -> Self {
        Self {
            username,
            operation: Operation::None,
            registered_at: Utc::now(),
        }
    }

    /// Endpunkt, falls der Benutzer lauscht
    pub fn endpoint(&self) -> Option<Endpoint> {
        match &self.operation {
            Operation::Listening(e) => Some(*e),
            _ => None,
        }
    }

    /// Gewuenschter Chat-Partner, falls der Benutzer verbindet
    pub fn peer_username(&self) -> Option<&Username> {
        match &self.operation {
            Operation::Connecting { peer } => Some(peer),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// UserTable
// ---------------------------------------------------------------------------

/// Tabelle aller registrierten Benutzer
///
/// Namen sind eindeutig (exakter Byte-Vergleich). Die Aufzaehlung liefert
/// die Benutzer in Registrierungsreihenfolge.
#[derive(Debug, Default)]
pub struct UserTable {
    benutzer: HashMap<Username, User>,
    reihenfolge: Vec<Username>,
}

impl UserTable {
    /// Erstellt eine leere Tabelle
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt einen neuen Benutzer mit `Operation::None` an
    pub fn register(&mut self, username: Username) -> DirectoryResult<User> {
        if self.benutzer.contains_key(username.as_str()) {
            return Err(DirectoryError::Konflikt(username.into_inner()));
        }
        let user = User::neu(username.clone());
        self.reihenfolge.push(username.clone());
        self.benutzer.insert(username, user.clone());
        Ok(user)
    }

    /// Entfernt einen Benutzer, `NichtGefunden` wenn er nicht existiert
    pub fn unregister(&mut self, username: &str) -> DirectoryResult<User> {
        self.remove(username)
            .ok_or_else(|| DirectoryError::NichtGefunden(username.to_string()))
    }

    /// Sucht einen Benutzer
    pub fn find(&self, username: &str) -> Option<&User> {
        self.benutzer.get(username)
    }

    /// Setzt die Operation eines Benutzers auf `Listening`
    pub fn set_listening(&mut self, username: &str, endpoint: Endpoint) -> DirectoryResult<()> {
        self.operation_setzen(username, Operation::Listening(endpoint))
    }

    /// Setzt die Operation eines Benutzers auf `Connecting`
    pub fn set_connecting(&mut self, username: &str, peer: Username) -> DirectoryResult<()> {
        self.operation_setzen(username, Operation::Connecting { peer })
    }

    /// Entfernt einen Benutzer falls vorhanden
    pub fn remove(&mut self, username: &str) -> Option<User> {
        let user = self.benutzer.remove(username)?;
        self.reihenfolge.retain(|u| u.as_str() != username);
        Some(user)
    }

    /// Alle Benutzer in Registrierungsreihenfolge
    pub fn enumerate(&self) -> impl Iterator<Item = &User> + '_ {
        self.reihenfolge
            .iter()
            .filter_map(|name| self.benutzer.get(name.as_str()))
    }

    /// Anzahl registrierter Benutzer
    pub fn len(&self) -> usize {
        self.benutzer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.benutzer.is_empty()
    }

    fn operation_setzen(&mut self, username: &str, operation: Operation) -> DirectoryResult<()> {
        let user = self
            .benutzer
            .get_mut(username)
            .ok_or_else(|| DirectoryError::NichtGefunden(username.to_string()))?;
        user.operation = operation;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Prozessweites, geteiltes Benutzerverzeichnis
///
/// Clone teilt den inneren Zustand. Jede Methode haelt den Lock nur fuer
/// die Dauer eines einzelnen Tabellenzugriffs. Zustandswechsel
/// (LISTEN, CONNECT) laufen ueber `transaktion`.
#[derive(Clone, Default)]
pub struct Directory {
    inner: Arc<Mutex<UserTable>>,
}

impl Directory {
    /// Erstellt ein leeres Verzeichnis
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen Benutzer
    pub fn register(&self, username: Username) -> DirectoryResult<User> {
        let ergebnis = self.inner.lock().register(username);
        match &ergebnis {
            Ok(user) => tracing::info!(username = %user.username, "Benutzer registriert"),
            Err(e) => tracing::debug!(fehler = %e, "Registrierung abgelehnt"),
        }
        ergebnis
    }

    /// Meldet einen Benutzer ab
    pub fn unregister(&self, username: &str) -> DirectoryResult<()> {
        self.inner.lock().unregister(username)?;
        tracing::info!(username = %username, "Benutzer abgemeldet");
        Ok(())
    }

    /// Gibt eine Kopie des Eintrags zurueck
    pub fn find(&self, username: &str) -> Option<User> {
        self.inner.lock().find(username).cloned()
    }

    /// Momentaufnahme aller Benutzer in Registrierungsreihenfolge
    pub fn enumerate(&self) -> Vec<User> {
        self.inner.lock().enumerate().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Fuehrt `f` unter dem Verzeichnis-Lock aus
    ///
    /// `f` darf nicht blockieren und kein `.await` enthalten.
    pub fn transaktion<R>(&self, f: impl FnOnce(&mut UserTable) -> R) -> R {
        let mut tabelle = self.inner.lock();
        f(&mut tabelle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
