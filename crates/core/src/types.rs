//! Gemeinsame Domaenentypen
//!
//! `Username` und `Endpoint` verwenden das Newtype-Pattern und werden nur
//! ueber validierende Konstruktoren erzeugt. Ein einmal erzeugter Wert ist
//! damit immer gueltig.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{RendezvousError, Result};

/// Maximale Laenge eines Benutzernamens in Bytes
pub const MAX_USERNAME_LAENGE: usize = 255;

/// Dynamischer Portbereich (IANA) fuer Chat-Listener der Clients
pub const DYNAMIC_PORT_RANGE: RangeInclusive<u16> = 49152..=65535;

// ---------------------------------------------------------------------------
// Username
// ---------------------------------------------------------------------------

/// Validierter Benutzername
///
/// 1 bis 255 Bytes, keine Steuerzeichen und kein Whitespace. Whitespace ist
/// ausgeschlossen weil der Name im CONNECT-Payload als Token uebertragen wird.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validiert und erzeugt einen Benutzernamen
    pub fn parse(roh: impl Into<String>) -> Result<Self> {
        let roh = roh.into();
        if roh.is_empty() {
            return Err(RendezvousError::BenutzernameLeer);
        }
        if roh.len() > MAX_USERNAME_LAENGE {
            return Err(RendezvousError::BenutzernameZuLang {
                laenge: roh.len(),
                maximum: MAX_USERNAME_LAENGE,
            });
        }
        if let Some(c) = roh.chars().find(|c| c.is_control() || c.is_whitespace()) {
            return Err(RendezvousError::BenutzernameZeichen(c));
        }
        Ok(Self(roh))
    }

    /// Gibt den Namen als `&str` zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Gibt den inneren String zurueck
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for Username {
    type Err = RendezvousError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Username {
    type Error = RendezvousError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Username> for String {
    fn from(u: Username) -> Self {
        u.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Angekuendigter Chat-Endpunkt eines lauschenden Clients
///
/// Der Port ist nie 0; die Adresse ist immer eine gueltige IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl Endpoint {
    /// Erstellt einen Endpunkt, Port 0 wird abgelehnt
    pub fn neu(address: IpAddr, port: u16) -> Result<Self> {
        if port == 0 {
            return Err(RendezvousError::UngueltigerPort("0".into()));
        }
        Ok(Self { address, port })
    }

    /// Parst Adresse und Port aus ihren Textformen
    pub fn parse(address: &str, port: &str) -> Result<Self> {
        let address: IpAddr = address
            .parse()
            .map_err(|_| RendezvousError::UngueltigeAdresse(address.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| RendezvousError::UngueltigerPort(port.to_string()))?;
        Self::neu(address, port)
    }

    /// Wie `neu`, verlangt aber zusaetzlich einen Port im dynamischen Bereich
    pub fn im_dynamischen_bereich(address: IpAddr, port: u16) -> Result<Self> {
        if !DYNAMIC_PORT_RANGE.contains(&port) {
            return Err(RendezvousError::PortAusserhalbBereich {
                port,
                von: *DYNAMIC_PORT_RANGE.start(),
                bis: *DYNAMIC_PORT_RANGE.end(),
            });
        }
        Self::neu(address, port)
    }

    /// Socket-Adresse fuer `connect`/`bind`
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(e: Endpoint) -> Self {
        e.socket_addr()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gueltiger_benutzername() {
        let u = Username::parse("alice").unwrap();
        assert_eq!(u.as_str(), "alice");
        assert_eq!(u.to_string(), "alice");
    }

    #[test]
    fn leerer_benutzername_abgelehnt() {
        assert_eq!(Username::parse(""), Err(RendezvousError::BenutzernameLeer));
    }

    #[test]
    fn benutzername_laengengrenze() {
        assert!(Username::parse("a".repeat(255)).is_ok());
        assert!(matches!(
            Username::parse("a".repeat(256)),
            Err(RendezvousError::BenutzernameZuLang { laenge: 256, .. })
        ));
    }

    #[test]
    fn benutzername_ohne_whitespace_und_steuerzeichen() {
        assert_eq!(
            Username::parse("al ice"),
            Err(RendezvousError::BenutzernameZeichen(' '))
        );
        assert!(Username::parse("bob\0").is_err());
        assert!(Username::parse("tab\tname").is_err());
    }

    #[test]
    fn benutzername_serde_validiert() {
        let u: Username = serde_json::from_str("\"carol\"").unwrap();
        assert_eq!(u.as_str(), "carol");
        assert!(serde_json::from_str::<Username>("\"\"").is_err());
    }

    #[test]
    fn endpoint_parsen() {
        let e = Endpoint::parse("127.0.0.1", "50010").unwrap();
        assert_eq!(e.port, 50010);
        assert_eq!(e.to_string(), "127.0.0.1:50010");
    }

    #[test]
    fn endpoint_ungueltige_werte() {
        assert!(matches!(
            Endpoint::parse("localhost", "50010"),
            Err(RendezvousError::UngueltigeAdresse(_))
        ));
        assert!(matches!(
            Endpoint::parse("127.0.0.1", "70000"),
            Err(RendezvousError::UngueltigerPort(_))
        ));
        assert!(Endpoint::parse("127.0.0.1", "0").is_err());
    }

    #[test]
    fn dynamischer_portbereich() {
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(Endpoint::im_dynamischen_bereich(ip, 49152).is_ok());
        assert!(Endpoint::im_dynamischen_bereich(ip, 65535).is_ok());
        assert!(Endpoint::im_dynamischen_bereich(ip, 49151).is_err());
    }
}
