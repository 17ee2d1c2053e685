//! Control-Protokoll des Verzeichnisdienstes
//!
//! Definiert die Nachrichten der beiden Protokollphasen und die
//! Status-Antworten des Servers.
//!
//! ## Nachrichten
//! - Init:      `R<username>` (REGISTER) oder `U<username>` (UNREGISTER)
//! - Operation: `L <ip> <port>` (LISTEN) oder `C <ziel>` (CONNECT)
//! - Antwort:   `<3 Ziffern><GRUND>`, bei CONNECT-Erfolg zusaetzlich ` <ip> <port>`
//!
//! Der Null-Terminator gehoert zum Wire-Format (`crate::wire`) und ist hier
//! nicht enthalten.

use rendezvous_core::{Endpoint, Username};

use crate::error::{ProtocolError, ProtocolResult};

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Opcode fuer REGISTER
pub const REGISTER_BYTE: u8 = b'R';
/// Opcode fuer UNREGISTER
pub const UNREGISTER_BYTE: u8 = b'U';
/// Opcode fuer LISTEN
pub const LISTEN_BYTE: u8 = b'L';
/// Opcode fuer CONNECT
pub const CONNECT_BYTE: u8 = b'C';

fn als_text(bytes: &[u8]) -> ProtocolResult<&str> {
    std::str::from_utf8(bytes).map_err(|_| ProtocolError::KeinUtf8)
}

// ---------------------------------------------------------------------------
// Init-Nachricht
// ---------------------------------------------------------------------------

/// Erste Nachricht jeder Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitMessage {
    /// Benutzer anlegen, danach folgt eine Operation
    Register(Username),
    /// Benutzer entfernen, danach wird die Verbindung geschlossen
    Unregister(Username),
}

impl InitMessage {
    /// Parst eine Init-Nachricht (ohne Terminator)
    pub fn parse(frame: &[u8]) -> ProtocolResult<Self> {
        let (&opcode, rest) = frame.split_first().ok_or(ProtocolError::LeereNachricht)?;
        let username = || -> ProtocolResult<Username> { Ok(Username::parse(als_text(rest)?)?) };

        match opcode {
            REGISTER_BYTE => Ok(Self::Register(username()?)),
            UNREGISTER_BYTE => Ok(Self::Unregister(username()?)),
            andere => Err(ProtocolError::UnbekannterOpcode(andere)),
        }
    }

    /// Gibt den Benutzernamen der Nachricht zurueck
    pub fn username(&self) -> &Username {
        match self {
            Self::Register(u) | Self::Unregister(u) => u,
        }
    }

    /// Wire-Form ohne Terminator
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for InitMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(u) => write!(f, "{}{}", REGISTER_BYTE as char, u),
            Self::Unregister(u) => write!(f, "{}{}", UNREGISTER_BYTE as char, u),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations-Nachricht
// ---------------------------------------------------------------------------

/// Zweite Nachricht nach erfolgreichem REGISTER
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationMessage {
    /// Client lauscht fuer Chats unter dem angegebenen Endpunkt
    Listen(Endpoint),
    /// Client moechte mit dem angegebenen Benutzer chatten
    Connect(Username),
}

impl OperationMessage {
    /// Parst eine Operations-Nachricht (ohne Terminator)
    ///
    /// Zwischen Opcode und Payload steht genau ein Leerzeichen; die Felder
    /// des Payloads sind durch Leerzeichen getrennt.
    pub fn parse(frame: &[u8]) -> ProtocolResult<Self> {
        let (&opcode, rest) = frame.split_first().ok_or(ProtocolError::LeereNachricht)?;
        if opcode != LISTEN_BYTE && opcode != CONNECT_BYTE {
            return Err(ProtocolError::UnbekannterOpcode(opcode));
        }

        let payload = als_text(rest)?
            .strip_prefix(' ')
            .ok_or(ProtocolError::FehlendesTrennzeichen)?;
        let felder: Vec<&str> = payload.split_ascii_whitespace().collect();

        if opcode == LISTEN_BYTE {
            match felder.as_slice() {
                [ip, port] => Ok(Self::Listen(Endpoint::parse(ip, port)?)),
                _ => Err(ProtocolError::payload(format!(
                    "LISTEN erwartet '<ip> <port>', erhalten: '{payload}'"
                ))),
            }
        } else {
            match felder.as_slice() {
                [ziel] => Ok(Self::Connect(Username::parse(*ziel)?)),
                _ => Err(ProtocolError::payload(format!(
                    "CONNECT erwartet '<benutzername>', erhalten: '{payload}'"
                ))),
            }
        }
    }

    /// Wire-Form ohne Terminator
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for OperationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listen(e) => write!(f, "{} {} {}", LISTEN_BYTE as char, e.address, e.port),
            Self::Connect(u) => write!(f, "{} {}", CONNECT_BYTE as char, u),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Statuscodes des Verzeichnisdienstes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 200 – Anfrage ausgefuehrt
    Ok,
    /// 400 – Nachricht fehlerhaft, Verbindung wird geschlossen
    BadRequest,
    /// 404 – Benutzer existiert nicht (oder lauscht nicht)
    NotFound,
    /// 409 – Benutzername bereits registriert
    Conflict,
}

impl Status {
    /// Numerischer Code (immer dreistellig)
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
        }
    }

    /// Grund-Wort in Grossbuchstaben
    pub fn grund(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "BADREQUEST",
            Self::NotFound => "NOTFOUND",
            Self::Conflict => "CONFLICT",
        }
    }

    /// Status zu einem numerischen Code
    pub fn aus_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(Self::Ok),
            400 => Some(Self::BadRequest),
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            _ => None,
        }
    }

    /// Gibt true zurueck fuer 2xx
    pub fn ist_erfolg(&self) -> bool {
        (200..300).contains(&self.code())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.code(), self.grund())
    }
}

// ---------------------------------------------------------------------------
// StatusResponse
// ---------------------------------------------------------------------------

/// Antwort des Servers auf eine Init- oder Operations-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: Status,
    /// Nur bei erfolgreichem CONNECT gesetzt
    pub endpoint: Option<Endpoint>,
}

impl StatusResponse {
    /// Antwort ohne Endpunkt
    pub fn neu(status: Status) -> Self {
        Self {
            status,
            endpoint: None,
        }
    }

    pub fn ok() -> Self {
        Self::neu(Status::Ok)
    }

    pub fn bad_request() -> Self {
        Self::neu(Status::BadRequest)
    }

    pub fn not_found() -> Self {
        Self::neu(Status::NotFound)
    }

    pub fn conflict() -> Self {
        Self::neu(Status::Conflict)
    }

    /// Erfolgreiches CONNECT mit dem Endpunkt des Ziels
    pub fn verbunden(endpoint: Endpoint) -> Self {
        Self {
            status: Status::Ok,
            endpoint: Some(endpoint),
        }
    }

    /// Parst eine Server-Antwort (clientseitig)
    pub fn parse(frame: &[u8]) -> ProtocolResult<Self> {
        let text = als_text(frame)?;
        let ungueltig = || ProtocolError::UngueltigeAntwort(text.to_string());

        let ziffern = text.get(..3).ok_or_else(ungueltig)?;
        if !ziffern.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ungueltig());
        }
        let code: u16 = ziffern.parse().map_err(|_| ungueltig())?;
        let status = Status::aus_code(code).ok_or(ProtocolError::UnbekannterStatus(code))?;

        let rest = &text[3..];
        let (grund, anhang) = match rest.split_once(' ') {
            Some((g, a)) => (g, Some(a)),
            None => (rest, None),
        };
        if grund != status.grund() {
            return Err(ungueltig());
        }

        let endpoint = match anhang {
            None => None,
            Some(anhang) => match anhang.split_ascii_whitespace().collect::<Vec<_>>().as_slice() {
                [ip, port] => Some(Endpoint::parse(ip, port)?),
                _ => return Err(ungueltig()),
            },
        };

        Ok(Self { status, endpoint })
    }

    /// Wire-Form ohne Terminator
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for StatusResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(e) = self.endpoint {
            write!(f, " {} {}", e.address, e.port)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_core::RendezvousError;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[test]
    fn init_register_parsen() {
        let msg = InitMessage::parse(b"Ralice").unwrap();
        assert_eq!(msg, InitMessage::Register(name("alice")));
        assert_eq!(msg.username().as_str(), "alice");
    }

    #[test]
    fn init_unregister_parsen() {
        let msg = InitMessage::parse(b"Ubob").unwrap();
        assert_eq!(msg, InitMessage::Unregister(name("bob")));
    }

    #[test]
    fn init_unbekannter_opcode() {
        assert_eq!(
            InitMessage::parse(b"Xalice"),
            Err(ProtocolError::UnbekannterOpcode(b'X'))
        );
        // Operations-Opcodes sind in der Init-Phase ebenfalls ungueltig
        assert_eq!(
            InitMessage::parse(b"L 1.2.3.4 50000"),
            Err(ProtocolError::UnbekannterOpcode(b'L'))
        );
    }

    #[test]
    fn init_leer_und_ohne_namen() {
        assert_eq!(InitMessage::parse(b""), Err(ProtocolError::LeereNachricht));
        assert_eq!(
            InitMessage::parse(b"R"),
            Err(ProtocolError::Validierung(RendezvousError::BenutzernameLeer))
        );
    }

    #[test]
    fn init_kein_utf8() {
        assert_eq!(
            InitMessage::parse(&[b'R', 0xff, 0xfe]),
            Err(ProtocolError::KeinUtf8)
        );
    }

    #[test]
    fn init_wire_form() {
        assert_eq!(InitMessage::Register(name("alice")).encode(), "Ralice");
        assert_eq!(InitMessage::Unregister(name("alice")).encode(), "Ualice");
    }

    #[test]
    fn listen_parsen() {
        let msg = OperationMessage::parse(b"L 127.0.0.1 50010").unwrap();
        let erwartet = Endpoint::parse("127.0.0.1", "50010").unwrap();
        assert_eq!(msg, OperationMessage::Listen(erwartet));
        assert_eq!(msg.encode(), "L 127.0.0.1 50010");
    }

    #[test]
    fn listen_ungueltiger_payload() {
        assert!(matches!(
            OperationMessage::parse(b"L 127.0.0.1"),
            Err(ProtocolError::UngueltigerPayload(_))
        ));
        assert!(matches!(
            OperationMessage::parse(b"L 127.0.0.1 99999"),
            Err(ProtocolError::Validierung(RendezvousError::UngueltigerPort(_)))
        ));
        assert!(matches!(
            OperationMessage::parse(b"L nirgendwo 50010"),
            Err(ProtocolError::Validierung(RendezvousError::UngueltigeAdresse(_)))
        ));
    }

    #[test]
    fn connect_parsen() {
        let msg = OperationMessage::parse(b"C alice").unwrap();
        assert_eq!(msg, OperationMessage::Connect(name("alice")));
        assert_eq!(msg.encode(), "C alice");
    }

    #[test]
    fn connect_ohne_trennzeichen() {
        assert_eq!(
            OperationMessage::parse(b"Calice"),
            Err(ProtocolError::FehlendesTrennzeichen)
        );
    }

    #[test]
    fn connect_zu_viele_felder() {
        assert!(matches!(
            OperationMessage::parse(b"C alice bob"),
            Err(ProtocolError::UngueltigerPayload(_))
        ));
    }

    #[test]
    fn operation_unbekannter_opcode() {
        assert_eq!(
            OperationMessage::parse(b"Ralice"),
            Err(ProtocolError::UnbekannterOpcode(b'R'))
        );
    }

    #[test]
    fn status_format_ohne_trennzeichen() {
        assert_eq!(StatusResponse::ok().encode(), "200OK");
        assert_eq!(StatusResponse::conflict().encode(), "409CONFLICT");
        assert_eq!(StatusResponse::not_found().encode(), "404NOTFOUND");
        assert_eq!(StatusResponse::bad_request().encode(), "400BADREQUEST");
    }

    #[test]
    fn connect_erfolg_format() {
        let e = Endpoint::parse("127.0.0.1", "50010").unwrap();
        assert_eq!(StatusResponse::verbunden(e).encode(), "200OK 127.0.0.1 50010");
    }

    #[test]
    fn antwort_parsen() {
        let antwort = StatusResponse::parse(b"200OK 10.1.2.3 50123").unwrap();
        assert_eq!(antwort.status, Status::Ok);
        assert_eq!(antwort.endpoint.unwrap().to_string(), "10.1.2.3:50123");

        let antwort = StatusResponse::parse(b"409CONFLICT").unwrap();
        assert_eq!(antwort, StatusResponse::conflict());
        assert!(!antwort.status.ist_erfolg());
    }

    #[test]
    fn antwort_ungueltig() {
        assert!(matches!(
            StatusResponse::parse(b"20OK"),
            Err(ProtocolError::UngueltigeAntwort(_))
        ));
        assert!(matches!(
            StatusResponse::parse(b"200NOTFOUND"),
            Err(ProtocolError::UngueltigeAntwort(_))
        ));
        assert_eq!(
            StatusResponse::parse(b"500ERROR"),
            Err(ProtocolError::UnbekannterStatus(500))
        );
        assert!(StatusResponse::parse(b"200OK 1.2.3.4").is_err());
    }
}
