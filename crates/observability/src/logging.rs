//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (ueberschreibt die Konfiguration):
//! - `RV_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard: info
//! - `RV_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{EnvFilter, fmt};

/// Umgebungsvariable fuer den Log-Level
pub const LOG_LEVEL_ENV: &str = "RV_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const LOG_FORMAT_ENV: &str = "RV_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// `RV_LOG_LEVEL` und `RV_LOG_FORMAT` haben Vorrang vor den uebergebenen
/// Werten. Faellt auf `info` zurueck wenn kein gueltiger Filter entsteht.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format_env = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| format.to_string());

    match format_env.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level), "{level}");
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }
}
