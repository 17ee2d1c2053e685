//! rendezvous-client – Chat-Client fuer den Rendezvous-Verzeichnisdienst
//!
//! - `connection`: Anmeldung, Endpunkt-Ankuendigung und -Abfrage beim Server
//! - `chat`: direkter Chat zwischen zwei Clients

pub mod chat;
pub mod connection;
pub mod error;

pub use connection::{abmelden, als_lauschend_anmelden, verbindung_anfragen, DirectoryConnection};
pub use error::{ClientError, ClientResult};
