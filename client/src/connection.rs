//! Client-seitige TCP-Verbindung zum Verzeichnisdienst
//!
//! Nutzt den FrameCodec aus rendezvous-protocol (null-terminierte
//! Nachrichten). Jede Verbindung traegt genau eine Init-Nachricht und
//! hoechstens eine Operation; danach schliesst der Server.

use futures_util::{SinkExt, StreamExt};
use rendezvous_core::{Endpoint, Username};
use rendezvous_protocol::{wire::FrameCodec, InitMessage, OperationMessage, StatusResponse};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::error::{ClientError, ClientResult};

// ---------------------------------------------------------------------------
// DirectoryConnection
// ---------------------------------------------------------------------------

/// TCP-Verbindung zum Rendezvous-Verzeichnisdienst
pub struct DirectoryConnection {
    /// Framed TCP-Stream mit FrameCodec
    framed: Framed<TcpStream, FrameCodec>,
    server: SocketAddr,
}

impl DirectoryConnection {
    /// Baut eine TCP-Verbindung zum Server auf
    pub async fn connect(server: SocketAddr) -> ClientResult<Self> {
        tracing::debug!(server = %server, "Verbinde mit Verzeichnisdienst");
        let stream = TcpStream::connect(server).await?;

        Ok(Self {
            framed: Framed::new(stream, FrameCodec::new()),
            server,
        })
    }

    /// Sendet eine Nachricht und wartet auf die Status-Antwort
    pub async fn send_and_receive(&mut self, nachricht: &str) -> ClientResult<StatusResponse> {
        tracing::trace!(server = %self.server, nachricht, "Sende");
        self.framed.send(nachricht).await?;

        match self.framed.next().await {
            Some(Ok(frame)) => Ok(StatusResponse::parse(&frame)?),
            Some(Err(e)) => Err(ClientError::Io(e)),
            None => Err(ClientError::VerbindungGetrennt),
        }
    }

    /// REGISTER – legt den Benutzer im Verzeichnis an
    pub async fn register(&mut self, username: &Username) -> ClientResult<()> {
        let init = InitMessage::Register(username.clone());
        let antwort = self.send_and_receive(&init.encode()).await?;
        erfolg_pruefen(&antwort, "REGISTER")?;
        tracing::info!(username = %username, "Registriert");
        Ok(())
    }

    /// LISTEN – kuendigt den eigenen Chat-Endpunkt an
    ///
    /// Verbraucht die Verbindung, der Server schliesst sie danach.
    pub async fn listen(mut self, endpoint: Endpoint) -> ClientResult<()> {
        let op = OperationMessage::Listen(endpoint);
        let antwort = self.send_and_receive(&op.encode()).await?;
        erfolg_pruefen(&antwort, "LISTEN")?;
        tracing::info!(endpoint = %endpoint, "Endpunkt angekuendigt");
        Ok(())
    }

    /// CONNECT – fragt den Chat-Endpunkt von `ziel` ab
    pub async fn connect_to(mut self, ziel: &Username) -> ClientResult<Endpoint> {
        let op = OperationMessage::Connect(ziel.clone());
        let antwort = self.send_and_receive(&op.encode()).await?;
        erfolg_pruefen(&antwort, "CONNECT")?;

        antwort.endpoint.ok_or_else(|| {
            ClientError::UnerwarteteAntwort(format!("CONNECT-Antwort ohne Endpunkt: {antwort}"))
        })
    }

    /// UNREGISTER – entfernt den Benutzer ueber diese Verbindung
    pub async fn unregister(mut self, username: &Username) -> ClientResult<()> {
        let init = InitMessage::Unregister(username.clone());
        let antwort = self.send_and_receive(&init.encode()).await?;
        erfolg_pruefen(&antwort, "UNREGISTER")?;
        tracing::info!(username = %username, "Abgemeldet");
        Ok(())
    }
}

fn erfolg_pruefen(antwort: &StatusResponse, anfrage: &'static str) -> ClientResult<()> {
    if antwort.status.ist_erfolg() {
        Ok(())
    } else {
        Err(ClientError::Abgelehnt {
            anfrage,
            status: antwort.status,
        })
    }
}

// ---------------------------------------------------------------------------
// Zusammengesetzte Ablaeufe
// ---------------------------------------------------------------------------

/// REGISTER und LISTEN auf einer Verbindung
pub async fn als_lauschend_anmelden(
    server: SocketAddr,
    username: &Username,
    endpoint: Endpoint,
) -> ClientResult<()> {
    let mut verbindung = DirectoryConnection::connect(server).await?;
    verbindung.register(username).await?;
    verbindung.listen(endpoint).await
}

/// REGISTER und CONNECT auf einer Verbindung, liefert den Endpunkt des Ziels
///
/// Bei `404` hat der Server den eigenen Eintrag bereits entfernt.
pub async fn verbindung_anfragen(
    server: SocketAddr,
    username: &Username,
    ziel: &Username,
) -> ClientResult<Endpoint> {
    let mut verbindung = DirectoryConnection::connect(server).await?;
    verbindung.register(username).await?;
    verbindung.connect_to(ziel).await
}

/// UNREGISTER ueber eine neue Verbindung
pub async fn abmelden(server: SocketAddr, username: &Username) -> ClientResult<()> {
    DirectoryConnection::connect(server)
        .await?
        .unregister(username)
        .await
}
