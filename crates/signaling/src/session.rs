//! Protokoll-Zustandsmaschine einer Verbindung
//!
//! Die `Session` macht kein I/O: der Verbindungs-Task reicht jede
//! vollstaendige Nachricht an `eingabe` weiter und holt danach die Antwort
//! mit `ausgabe_nehmen` ab.
//!
//! ```text
//! AwaitingInit --REGISTER ok--> Registered --(Antwort gesendet)--> AwaitingOperation
//!      |                                                                 |
//!      +--409 / UNREGISTER / 400-------------> Done <--LISTEN/CONNECT/400-+
//! ```

use rendezvous_core::{Endpoint, Username};
use rendezvous_protocol::{InitMessage, OperationMessage, ProtocolError, StatusResponse};
use uuid::Uuid;

use crate::broker::{self, Vermittlung};
use crate::directory::Directory;

// ---------------------------------------------------------------------------
// Zustaende und Ereignisse
// ---------------------------------------------------------------------------

/// Phase der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Wartet auf REGISTER oder UNREGISTER
    AwaitingInit,
    /// REGISTER war erfolgreich, Antwort noch nicht abgeholt
    Registered,
    /// Wartet auf LISTEN oder CONNECT
    AwaitingOperation,
    /// Verbindung wird geschlossen
    Done,
}

/// Was eine Eingabe bewirkt hat (fuer Logging und Metriken)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Registriert(Username),
    Konflikt(Username),
    Abgemeldet(Username),
    AbmeldungNichtGefunden(Username),
    Lauscht { username: Username, endpoint: Endpoint },
    Verbunden { username: Username, ziel: Username, endpoint: Endpoint },
    ZielNichtGefunden { username: Username, ziel: Username },
    /// Anfrager wurde zwischen REGISTER und Operation abgemeldet
    AnfragerVerschwunden(Username),
    Fehlerhaft(ProtocolError),
    /// Eingabe nach Sessionende, keine Wirkung
    Ignoriert,
}

impl SessionEvent {
    /// Kurzbezeichnung fuer Metrik-Labels
    pub fn bezeichnung(&self) -> &'static str {
        match self {
            Self::Registriert(_) => "registriert",
            Self::Konflikt(_) => "konflikt",
            Self::Abgemeldet(_) => "abgemeldet",
            Self::AbmeldungNichtGefunden(_) => "abmeldung_nicht_gefunden",
            Self::Lauscht { .. } => "lauscht",
            Self::Verbunden { .. } => "verbunden",
            Self::ZielNichtGefunden { .. } => "ziel_nicht_gefunden",
            Self::AnfragerVerschwunden(_) => "anfrager_verschwunden",
            Self::Fehlerhaft(_) => "fehlerhaft",
            Self::Ignoriert => "ignoriert",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Zustand einer einzelnen Client-Verbindung
pub struct Session {
    id: Uuid,
    directory: Directory,
    stage: SessionStage,
    username: Option<Username>,
    ausgabe: Option<StatusResponse>,
}

impl Session {
    /// Erstellt eine Session in `AwaitingInit`
    pub fn neu(directory: Directory) -> Self {
        Self {
            id: Uuid::new_v4(),
            directory,
            stage: SessionStage::AwaitingInit,
            username: None,
            ausgabe: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    /// Per REGISTER gebundener Benutzername
    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    pub fn ist_beendet(&self) -> bool {
        self.stage == SessionStage::Done
    }

    /// Verarbeitet eine vollstaendige Nachricht (ohne Terminator)
    ///
    /// Jede Eingabe vor `Done` erzeugt genau eine Antwort. Eine noch nicht
    /// abgeholte Antwort wird dabei ersetzt; der Aufrufer muss nach jeder
    /// Eingabe `ausgabe_nehmen` aufrufen.
    pub fn eingabe(&mut self, frame: &[u8]) -> SessionEvent {
        let (antwort, stage, event) = match self.stage {
            SessionStage::AwaitingInit => self.init_verarbeiten(frame),
            SessionStage::Registered | SessionStage::AwaitingOperation => {
                self.operation_verarbeiten(frame)
            }
            SessionStage::Done => return SessionEvent::Ignoriert,
        };

        tracing::debug!(
            session = %self.id,
            von = ?self.stage,
            nach = ?stage,
            antwort = %antwort,
            "Session-Uebergang"
        );

        self.stage = stage;
        self.ausgabe = Some(antwort);
        event
    }

    /// Holt die ausstehende Antwort ab
    ///
    /// Nach der REGISTER-Antwort wechselt die Session nach
    /// `AwaitingOperation`.
    pub fn ausgabe_nehmen(&mut self) -> Option<StatusResponse> {
        let antwort = self.ausgabe.take()?;
        if self.stage == SessionStage::Registered {
            self.stage = SessionStage::AwaitingOperation;
        }
        Some(antwort)
    }

    // -----------------------------------------------------------------------
    // Interne Uebergaenge
    // -----------------------------------------------------------------------

    fn init_verarbeiten(&mut self, frame: &[u8]) -> (StatusResponse, SessionStage, SessionEvent) {
        let nachricht = match InitMessage::parse(frame) {
            Ok(n) => n,
            Err(e) => return fehlerhaft(e),
        };

        match nachricht {
            InitMessage::Register(username) => match self.directory.register(username.clone()) {
                Ok(_) => {
                    self.username = Some(username.clone());
                    (
                        StatusResponse::ok(),
                        SessionStage::Registered,
                        SessionEvent::Registriert(username),
                    )
                }
                Err(_) => (
                    StatusResponse::conflict(),
                    SessionStage::Done,
                    SessionEvent::Konflikt(username),
                ),
            },
            InitMessage::Unregister(username) => {
                match self.directory.unregister(username.as_str()) {
                    Ok(()) => (
                        StatusResponse::ok(),
                        SessionStage::Done,
                        SessionEvent::Abgemeldet(username),
                    ),
                    Err(_) => (
                        StatusResponse::not_found(),
                        SessionStage::Done,
                        SessionEvent::AbmeldungNichtGefunden(username),
                    ),
                }
            }
        }
    }

    fn operation_verarbeiten(
        &mut self,
        frame: &[u8],
    ) -> (StatusResponse, SessionStage, SessionEvent) {
        let nachricht = match OperationMessage::parse(frame) {
            Ok(n) => n,
            Err(e) => return fehlerhaft(e),
        };

        // In diesen Phasen ist immer ein Name gebunden
        let Some(anfrager) = self.username.clone() else {
            return fehlerhaft(ProtocolError::payload("Operation ohne Registrierung"));
        };

        match nachricht {
            OperationMessage::Listen(endpoint) => {
                let ergebnis = self
                    .directory
                    .transaktion(|t| broker::ankuendigen(t, anfrager.as_str(), endpoint));
                match ergebnis {
                    Ok(()) => (
                        StatusResponse::ok(),
                        SessionStage::Done,
                        SessionEvent::Lauscht {
                            username: anfrager,
                            endpoint,
                        },
                    ),
                    Err(_) => (
                        StatusResponse::not_found(),
                        SessionStage::Done,
                        SessionEvent::AnfragerVerschwunden(anfrager),
                    ),
                }
            }
            OperationMessage::Connect(ziel) => {
                let vermittlung = self
                    .directory
                    .transaktion(|t| broker::vermitteln(t, anfrager.as_str(), &ziel));
                let antwort = vermittlung.antwort();
                let event = match vermittlung {
                    Vermittlung::Verbunden(endpoint) => SessionEvent::Verbunden {
                        username: anfrager,
                        ziel,
                        endpoint,
                    },
                    Vermittlung::ZielNichtGefunden => SessionEvent::ZielNichtGefunden {
                        username: anfrager,
                        ziel,
                    },
                    Vermittlung::AnfragerUnbekannt => SessionEvent::AnfragerVerschwunden(anfrager),
                };
                (antwort, SessionStage::Done, event)
            }
        }
    }
}

fn fehlerhaft(e: ProtocolError) -> (StatusResponse, SessionStage, SessionEvent) {
    (
        StatusResponse::bad_request(),
        SessionStage::Done,
        SessionEvent::Fehlerhaft(e),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Operation;
    use rendezvous_protocol::Status;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    /// Fuehrt Eingaben nacheinander aus und gibt die Antworten als Text zurueck
    fn ablauf(session: &mut Session, eingaben: &[&[u8]]) -> Vec<String> {
        eingaben
            .iter()
            .map(|e| {
                session.eingabe(e);
                session.ausgabe_nehmen().expect("Antwort erwartet").encode()
            })
            .collect()
    }

    #[test]
    fn register_und_listen() {
        let d = Directory::neu();
        let mut s = Session::neu(d.clone());

        s.eingabe(b"Ralice");
        assert_eq!(s.stage(), SessionStage::Registered);
        assert_eq!(s.ausgabe_nehmen(), Some(StatusResponse::ok()));
        assert_eq!(s.stage(), SessionStage::AwaitingOperation);

        let event = s.eingabe(b"L 127.0.0.1 50010");
        assert!(matches!(event, SessionEvent::Lauscht { .. }));
        assert_eq!(s.ausgabe_nehmen(), Some(StatusResponse::ok()));
        assert!(s.ist_beendet());
        assert_eq!(s.username().map(Username::as_str), Some("alice"));

        let alice = d.find("alice").unwrap();
        assert_eq!(alice.endpoint().unwrap().to_string(), "127.0.0.1:50010");
    }

    #[test]
    fn ende_zu_ende_alice_und_bob() {
        let d = Directory::neu();
        let mut alice = Session::neu(d.clone());
        let mut bob = Session::neu(d.clone());

        assert_eq!(
            ablauf(&mut alice, &[b"Ralice", b"L 127.0.0.1 50010"]),
            vec!["200OK", "200OK"]
        );
        assert_eq!(
            ablauf(&mut bob, &[b"Rbob", b"C alice"]),
            vec!["200OK", "200OK 127.0.0.1 50010"]
        );

        assert_eq!(
            d.find("bob").unwrap().operation,
            Operation::Connecting { peer: name("alice") }
        );
    }

    #[test]
    fn doppelte_registrierung() {
        let d = Directory::neu();
        let mut erste = Session::neu(d.clone());
        let mut zweite = Session::neu(d.clone());

        assert_eq!(ablauf(&mut erste, &[b"Ralice"]), vec!["200OK"]);
        let event = zweite.eingabe(b"Ralice");
        assert_eq!(event, SessionEvent::Konflikt(name("alice")));
        assert_eq!(zweite.ausgabe_nehmen(), Some(StatusResponse::conflict()));
        assert!(zweite.ist_beendet());
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn unregister_vorhanden_und_abwesend() {
        let d = Directory::neu();
        ablauf(&mut Session::neu(d.clone()), &[b"Ralice"]);

        let mut s = Session::neu(d.clone());
        assert_eq!(ablauf(&mut s, &[b"Ualice"]), vec!["200OK"]);
        assert!(s.ist_beendet());
        assert!(d.find("alice").is_none());

        let mut s = Session::neu(d.clone());
        assert_eq!(ablauf(&mut s, &[b"Ualice"]), vec!["404NOTFOUND"]);
    }

    #[test]
    fn connect_zu_unbekanntem_entfernt_anfrager() {
        let d = Directory::neu();
        let mut bob = Session::neu(d.clone());
        assert_eq!(
            ablauf(&mut bob, &[b"Rbob", b"C carol"]),
            vec!["200OK", "404NOTFOUND"]
        );
        assert!(d.find("bob").is_none());

        // bob kann sich erneut registrieren
        let mut wieder = Session::neu(d.clone());
        assert_eq!(ablauf(&mut wieder, &[b"Rbob"]), vec!["200OK"]);
    }

    #[test]
    fn fehlerhafte_init_nachricht() {
        let d = Directory::neu();
        for eingabe in [&b"Xalice"[..], b"", b"R", b"Ral ice", b"L 1.2.3.4 5"] {
            let mut s = Session::neu(d.clone());
            let event = s.eingabe(eingabe);
            assert!(matches!(event, SessionEvent::Fehlerhaft(_)), "{eingabe:?}");
            assert_eq!(s.ausgabe_nehmen().unwrap().status, Status::BadRequest);
            assert!(s.ist_beendet());
        }
        assert!(d.is_empty());
    }

    #[test]
    fn fehlerhafte_operation_laesst_verzeichnis_unveraendert() {
        let d = Directory::neu();
        let mut s = Session::neu(d.clone());
        assert_eq!(
            ablauf(&mut s, &[b"Ralice", b"L 127.0.0.1"]),
            vec!["200OK", "400BADREQUEST"]
        );
        assert!(s.ist_beendet());
        assert_eq!(d.find("alice").unwrap().operation, Operation::None);
    }

    #[test]
    fn operation_nach_gleichzeitiger_abmeldung() {
        let d = Directory::neu();
        let mut s = Session::neu(d.clone());
        ablauf(&mut s, &[b"Ralice"]);

        d.unregister("alice").unwrap();

        let event = s.eingabe(b"L 127.0.0.1 50010");
        assert_eq!(event, SessionEvent::AnfragerVerschwunden(name("alice")));
        assert_eq!(s.ausgabe_nehmen(), Some(StatusResponse::not_found()));
        assert!(d.is_empty());
    }

    #[test]
    fn eingabe_nach_ende_wird_ignoriert() {
        let d = Directory::neu();
        let mut s = Session::neu(d);
        ablauf(&mut s, &[b"Unobody"]);

        assert_eq!(s.eingabe(b"Ralice"), SessionEvent::Ignoriert);
        assert!(s.ausgabe_nehmen().is_none());
    }

    #[test]
    fn event_bezeichnungen() {
        assert_eq!(SessionEvent::Registriert(name("a")).bezeichnung(), "registriert");
        assert_eq!(
            SessionEvent::Fehlerhaft(ProtocolError::LeereNachricht).bezeichnung(),
            "fehlerhaft"
        );
    }
}
