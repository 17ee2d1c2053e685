//! Fehlertypen fuer den Rendezvous-Dienst
//!
//! Zentraler Fehler-Enum fuer Validierungsfehler der Domaenentypen.
//! Die anderen Crates definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias
pub type Result<T> = std::result::Result<T, RendezvousError>;

/// Validierungsfehler der gemeinsamen Domaenentypen
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendezvousError {
    #[error("Benutzername ist leer")]
    BenutzernameLeer,

    #[error("Benutzername zu lang: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    BenutzernameZuLang { laenge: usize, maximum: usize },

    #[error("Benutzername enthaelt unzulaessiges Zeichen: {0:?}")]
    BenutzernameZeichen(char),

    #[error("Ungueltige IP-Adresse: {0}")]
    UngueltigeAdresse(String),

    #[error("Ungueltiger Port: {0}")]
    UngueltigerPort(String),

    #[error("Port {port} liegt nicht im Bereich {von}-{bis}")]
    PortAusserhalbBereich { port: u16, von: u16, bis: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = RendezvousError::BenutzernameZuLang {
            laenge: 300,
            maximum: 255,
        };
        assert_eq!(
            e.to_string(),
            "Benutzername zu lang: 300 Bytes (Maximum: 255 Bytes)"
        );
    }

    #[test]
    fn port_bereich_fehler() {
        let e = RendezvousError::PortAusserhalbBereich {
            port: 80,
            von: 49152,
            bis: 65535,
        };
        assert!(e.to_string().contains("49152-65535"));
    }
}
