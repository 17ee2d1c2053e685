//! rendezvous-signaling – TCP-Verzeichnis und Verbindungsvermittlung
//!
//! Dieser Crate implementiert den Verzeichnisdienst: Clients registrieren
//! einen Benutzernamen, kuendigen optional ihren Chat-Endpunkt an oder
//! fragen den Endpunkt eines anderen Benutzers ab.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, Timeout, Byte-Zaehler)
//!     |
//!     v
//! Session (Zustandsmaschine: AwaitingInit -> Registered -> AwaitingOperation -> Done)
//!     |
//!     +-- broker     (LISTEN eintragen, CONNECT aufloesen)
//!     |
//!     v
//! Directory (UserTable hinter einem Lock)
//! ```

pub mod broker;
pub mod connection;
pub mod directory;
pub mod error;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::{ByteZaehler, ClientConnection};
pub use directory::{Directory, Operation, User, UserTable};
pub use error::{DirectoryError, DirectoryResult, SignalingError, SignalingResult};
pub use server_state::{SignalingConfig, SignalingState};
pub use session::{Session, SessionEvent, SessionStage};
pub use tcp::SignalingServer;
