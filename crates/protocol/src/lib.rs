//! rendezvous-protocol – Verzeichnisprotokoll-Definitionen
//!
//! Dieses Crate definiert die Nachrichten die zwischen Client und
//! Verzeichnisserver ausgetauscht werden, sowie das Wire-Format
//! (ASCII-Text, jede Nachricht mit einem Null-Byte abgeschlossen).
//!
//! ## Ablauf einer Verbindung
//!
//! ```text
//! Client                                  Server
//!   | -- R<username>\0 ------------------->  |
//!   | <------------------------- 200OK\0 --  |
//!   | -- C <ziel>\0 ----------------------->  |
//!   | <------------ 200OK <ip> <port>\0 ---  |
//! ```

pub mod control;
pub mod error;
pub mod wire;

pub use control::{InitMessage, OperationMessage, Status, StatusResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use wire::FrameCodec;
