//! Peer-to-Peer-Chat zwischen zwei Clients
//!
//! Auf der direkten Verbindung gilt dasselbe Wire-Format wie zum Server
//! (null-terminierte Nachrichten). Die erste Nachricht des verbindenden
//! Clients ist sein Benutzername, danach folgt Text. Der lauschende Client
//! gibt jede Nachricht aus und schickt sie als Echo zurueck.

use futures_util::{SinkExt, StreamExt};
use rendezvous_core::Username;
use rendezvous_protocol::wire::FrameCodec;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use crate::error::{ClientError, ClientResult};

/// Prueft ob eine Eingabezeile den Chat beendet (`q` oder `Q`)
pub fn ist_beenden(zeile: &str) -> bool {
    matches!(zeile.trim(), "q" | "Q")
}

async fn zeile_ausgeben<W>(ausgabe: &mut W, zeile: &str) -> ClientResult<()>
where
    W: AsyncWrite + Unpin,
{
    ausgabe.write_all(zeile.as_bytes()).await?;
    ausgabe.write_all(b"\n").await?;
    ausgabe.flush().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Lauschende Seite
// ---------------------------------------------------------------------------

/// Bedient eingehende Chats nacheinander bis `shutdown` fertig ist
///
/// Fehler einer einzelnen Chat-Verbindung beenden nur diesen Chat.
pub async fn lauschen<W>(
    listener: TcpListener,
    ausgabe: &mut W,
    shutdown: impl Future<Output = ()>,
) -> ClientResult<()>
where
    W: AsyncWrite + Unpin,
{
    tokio::pin!(shutdown);
    tracing::info!(adresse = %listener.local_addr()?, "Warte auf Chat-Partner");

    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = &mut shutdown => break,
            angenommen = listener.accept() => angenommen?,
        };
        tracing::debug!(peer = %peer_addr, "Chat-Verbindung angenommen");

        tokio::select! {
            _ = &mut shutdown => break,
            ergebnis = peer_bedienen(stream, ausgabe) => {
                if let Err(e) = ergebnis {
                    tracing::warn!(peer = %peer_addr, fehler = %e, "Chat abgebrochen");
                }
            }
        }
    }

    tracing::info!("Lauschen beendet");
    Ok(())
}

/// Fuehrt einen Chat mit einem verbundenen Partner bis dieser trennt
pub async fn peer_bedienen<S, W>(stream: S, ausgabe: &mut W) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, FrameCodec::new());

    let name = framed.next().await.ok_or(ClientError::VerbindungGetrennt)??;
    let partner = String::from_utf8_lossy(&name).into_owned();
    zeile_ausgeben(ausgabe, &format!("*** {partner} ist verbunden ***")).await?;

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let text = String::from_utf8_lossy(&frame).into_owned();
        zeile_ausgeben(ausgabe, &format!("[{partner}] {text}")).await?;

        // Echo an den Absender
        framed.send(frame).await?;
    }

    zeile_ausgeben(ausgabe, &format!("*** {partner} hat den Chat verlassen ***")).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Verbindende Seite
// ---------------------------------------------------------------------------

/// Chattet mit einem lauschenden Partner
///
/// Sendet zuerst den eigenen Namen, dann jede Eingabezeile; gibt das Echo
/// des Partners aus. Endet bei `q`/`Q`, Eingabeende oder Trennung.
pub async fn chatten<S, R, W>(
    stream: S,
    eigener_name: &Username,
    partner: &Username,
    eingabe: R,
    ausgabe: &mut W,
) -> ClientResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, FrameCodec::new());
    framed.send(eigener_name.as_str()).await?;
    zeile_ausgeben(ausgabe, &format!("*** Verbunden mit {partner}, 'q' beendet ***")).await?;

    let mut zeilen = eingabe.lines();
    while let Some(zeile) = zeilen.next_line().await? {
        if ist_beenden(&zeile) {
            break;
        }
        if zeile.is_empty() {
            continue;
        }

        framed.send(zeile.as_str()).await?;
        let echo = framed.next().await.ok_or(ClientError::VerbindungGetrennt)??;
        zeile_ausgeben(
            ausgabe,
            &format!("[{partner}] {}", String::from_utf8_lossy(&echo)),
        )
        .await?;
    }

    tracing::debug!(partner = %partner, "Chat beendet");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[test]
    fn beenden_zeilen() {
        assert!(ist_beenden("q"));
        assert!(ist_beenden("Q"));
        assert!(ist_beenden(" q \r"));
        assert!(!ist_beenden("quit"));
        assert!(!ist_beenden(""));
    }

    #[tokio::test]
    async fn chat_ueber_duplex_mit_echo() {
        let (links, rechts) = tokio::io::duplex(1024);

        let lauscher = tokio::spawn(async move {
            let mut ausgabe = Vec::new();
            peer_bedienen(rechts, &mut ausgabe).await.unwrap();
            String::from_utf8(ausgabe).unwrap()
        });

        let eingabe: &[u8] = b"hallo alice\n\nwie gehts?\nq\nnicht gesendet\n";
        let mut ausgabe = Vec::new();
        chatten(links, &name("bob"), &name("alice"), eingabe, &mut ausgabe)
            .await
            .unwrap();

        let bob_sieht = String::from_utf8(ausgabe).unwrap();
        assert!(bob_sieht.contains("[alice] hallo alice"));
        assert!(bob_sieht.contains("[alice] wie gehts?"));
        assert!(!bob_sieht.contains("nicht gesendet"));

        let alice_sieht = lauscher.await.unwrap();
        assert!(alice_sieht.starts_with("*** bob ist verbunden ***"));
        assert!(alice_sieht.contains("[bob] hallo alice\n[bob] wie gehts?\n"));
        assert!(alice_sieht.contains("*** bob hat den Chat verlassen ***"));
    }

    #[tokio::test]
    async fn partner_trennt_vor_namen() {
        let (links, rechts) = tokio::io::duplex(64);
        drop(links);

        let mut ausgabe = Vec::new();
        assert!(matches!(
            peer_bedienen(rechts, &mut ausgabe).await,
            Err(ClientError::VerbindungGetrennt)
        ));
    }

    #[tokio::test]
    async fn eingabeende_beendet_chat() {
        let (links, rechts) = tokio::io::duplex(256);
        let lauscher = tokio::spawn(async move {
            let mut ausgabe = Vec::new();
            peer_bedienen(rechts, &mut ausgabe).await
        });

        let mut ausgabe = Vec::new();
        chatten(links, &name("carol"), &name("dave"), &b"eins\n"[..], &mut ausgabe)
            .await
            .unwrap();

        assert!(lauscher.await.unwrap().is_ok());
        assert!(String::from_utf8(ausgabe).unwrap().contains("[dave] eins"));
    }
}
