//! rendezvous-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die vom
//! Protokoll, vom Signaling-Server und vom Client gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{RendezvousError, Result};
pub use types::{Endpoint, Username, DYNAMIC_PORT_RANGE, MAX_USERNAME_LAENGE};
