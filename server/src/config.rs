//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Kommandozeilen-Optionen ueberschreiben Dateiwerte.

use anyhow::{bail, Context};
use rendezvous_observability::{log_format_gueltig, log_level_gueltig};
use rendezvous_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

/// Standard-Port des Verzeichnisdienstes
pub const STANDARD_PORT: u16 = 29000;

/// Herkunft einer geladenen Konfiguration
///
/// `laden` laeuft vor der Logging-Initialisierung; der Aufrufer meldet
/// eine fehlende Datei erst danach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigQuelle {
    /// Aus der angegebenen Datei gelesen
    Datei,
    /// Datei nicht gefunden, Standardwerte
    Standardwerte,
}

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Sitzungs-Einstellungen (Timeouts, Limits)
    pub sitzung: SitzungsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse (ignoriert wenn `alle_schnittstellen` gesetzt ist)
    pub bind_adresse: String,
    /// TCP-Port des Verzeichnisdienstes
    pub port: u16,
    /// Auf allen Schnittstellen lauschen (0.0.0.0)
    pub alle_schnittstellen: bool,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "127.0.0.1".into(),
            port: STANDARD_PORT,
            alle_schnittstellen: false,
        }
    }
}

/// Sitzungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    /// Lese-Timeout pro Nachricht in Sekunden
    pub lese_timeout_sek: u64,
    /// Maximale Nachrichtengroesse in Bytes (ohne Terminator)
    pub max_nachricht_bytes: usize,
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: usize,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            lese_timeout_sek: standard.lese_timeout_sek,
            max_nachricht_bytes: standard.max_nachricht_bytes,
            max_verbindungen: standard.max_verbindungen,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 29100)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            port: 29100,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: impl AsRef<Path>) -> anyhow::Result<(Self, ConfigQuelle)> {
        let pfad = pfad.as_ref();
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).with_context(|| {
                    format!("Konfigurationsfehler in '{}'", pfad.display())
                })?;
                Ok((config, ConfigQuelle::Datei))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigQuelle::Standardwerte))
            }
            Err(e) => Err(e).with_context(|| {
                format!("Konfigurationsdatei '{}' nicht lesbar", pfad.display())
            }),
        }
    }

    /// Prueft Wertebereiche die serde nicht abdeckt
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.netzwerk.port == 0 {
            bail!("netzwerk.port darf nicht 0 sein");
        }
        if self.sitzung.lese_timeout_sek == 0 {
            bail!("sitzung.lese_timeout_sek muss groesser als 0 sein");
        }
        if self.sitzung.max_verbindungen == 0 {
            bail!("sitzung.max_verbindungen muss groesser als 0 sein");
        }
        if self.sitzung.max_nachricht_bytes < 2 {
            bail!("sitzung.max_nachricht_bytes ist zu klein");
        }
        if !log_level_gueltig(&self.logging.level) {
            bail!("Ungueltiger Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("Ungueltiges Log-Format: '{}'", self.logging.format);
        }
        Ok(())
    }

    fn bind_ip(&self) -> anyhow::Result<IpAddr> {
        if self.netzwerk.alle_schnittstellen {
            return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        self.netzwerk
            .bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.netzwerk.bind_adresse))
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        Ok(SocketAddr::new(self.bind_ip()?, self.netzwerk.port))
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        Ok(SocketAddr::new(self.bind_ip()?, self.observability.port))
    }

    /// Konfiguration fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_verbindungen: self.sitzung.max_verbindungen,
            lese_timeout_sek: self.sitzung.lese_timeout_sek,
            max_nachricht_bytes: self.sitzung.max_nachricht_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 29000);
        assert!(!cfg.netzwerk.alle_schnittstellen);
        assert_eq!(cfg.sitzung.lese_timeout_sek, 30);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.observability.aktiviert);
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn bind_adressen() {
        let mut cfg = ServerConfig::default();
        assert_eq!(cfg.tcp_bind_adresse().unwrap().to_string(), "127.0.0.1:29000");
        assert_eq!(
            cfg.observability_bind_adresse().unwrap().to_string(),
            "127.0.0.1:29100"
        );

        cfg.netzwerk.alle_schnittstellen = true;
        assert_eq!(cfg.tcp_bind_adresse().unwrap().to_string(), "0.0.0.0:29000");
    }

    #[test]
    fn ungueltige_bind_adresse() {
        let mut cfg = ServerConfig::default();
        cfg.netzwerk.bind_adresse = "localhost".into();
        assert!(cfg.tcp_bind_adresse().is_err());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 31000

            [sitzung]
            lese_timeout_sek = 5

            [logging]
            format = "json"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 31000);
        assert_eq!(cfg.sitzung.lese_timeout_sek, 5);
        assert_eq!(cfg.logging.format, "json");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "127.0.0.1");
        assert_eq!(cfg.sitzung.max_verbindungen, 512);
    }

    #[test]
    fn signaling_config_uebernimmt_sitzung() {
        let mut cfg = ServerConfig::default();
        cfg.sitzung.max_verbindungen = 8;
        cfg.sitzung.max_nachricht_bytes = 300;
        let sig = cfg.signaling_config();
        assert_eq!(sig.max_verbindungen, 8);
        assert_eq!(sig.max_nachricht_bytes, 300);
    }

    #[test]
    fn validierung_lehnt_ungueltige_werte_ab() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.sitzung.max_verbindungen = 0;
        assert!(cfg.validieren().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let (cfg, quelle) = ServerConfig::laden("/nicht/vorhanden/rendezvous.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, STANDARD_PORT);
        assert_eq!(quelle, ConfigQuelle::Standardwerte);
    }

    #[test]
    fn vorhandene_datei_wird_als_quelle_gemeldet() {
        let pfad = std::env::temp_dir().join(format!(
            "rendezvous-test-quelle-{}.toml",
            std::process::id()
        ));
        std::fs::write(&pfad, "[netzwerk]\nport = 29500\n").unwrap();
        let (cfg, quelle) = ServerConfig::laden(&pfad).unwrap();
        let _ = std::fs::remove_file(&pfad);

        assert_eq!(quelle, ConfigQuelle::Datei);
        assert_eq!(cfg.netzwerk.port, 29500);
    }

    #[test]
    fn fehlerhafte_datei_ist_fehler() {
        let pfad = std::env::temp_dir().join(format!("rendezvous-test-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[netzwerk]\nport = \"kein port\"\n").unwrap();
        assert!(ServerConfig::laden(&pfad).is_err());
        let _ = std::fs::remove_file(&pfad);
    }
}
