//! Wire-Format fuer TCP-Verbindungen
//!
//! Jede Nachricht ist ein ASCII-String, abgeschlossen mit genau einem
//! Null-Byte. Es gibt kein Laengenfeld.
//!
//! ## Frame-Format
//!
//! ```text
//! +----...----+------+
//! | Payload   | 0x00 |
//! +----...----+------+
//! ```
//!
//! Der Decoder sucht das Null-Byte im Puffer. Eine Nachricht die ueber
//! mehrere `read`-Aufrufe verteilt ankommt wird zusammengesetzt, mehrere
//! Nachrichten in einem Puffer werden einzeln geliefert. Bei EOF wird ein
//! unterminierter Rest als letzte Nachricht geliefert.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Nachrichtengroesse ohne Terminator (1 KB)
///
/// Die laengste gueltige Nachricht ist ein Opcode plus 255 Bytes Name.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Abschlussbyte jeder Nachricht
pub const TERMINATOR: u8 = 0;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer null-terminierte Nachrichten
///
/// Dekodiert zu rohen `BytesMut`-Frames (ohne Terminator); das Parsen in
/// typisierte Nachrichten uebernimmt `crate::control`. Kodiert alles was
/// `AsRef<[u8]>` ist.
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use rendezvous_protocol::wire::FrameCodec;
///
/// // let stream = TcpStream::connect(...).await?;
/// // let framed = Framed::new(stream, FrameCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Nachrichtengroesse in Bytes
    max_frame_size: usize,
    /// Ab hier wurde im Puffer noch nicht nach dem Terminator gesucht
    naechster_index: usize,
    /// Summe aller dekodierten Bytes inklusive verbrauchter Terminatoren
    dekodiert: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            naechster_index: 0,
            dekodiert: 0,
        }
    }

    /// Gibt die konfigurierte maximale Nachrichtengroesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Bytes aller bisher gelieferten Frames inklusive Terminator
    ///
    /// Ein unterminierter Rest am Verbindungsende zaehlt nur mit seiner
    /// tatsaechlichen Laenge.
    pub fn dekodierte_bytes(&self) -> usize {
        self.dekodiert
    }

    fn zu_gross(&self, laenge: usize) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                laenge, self.max_frame_size
            ),
        )
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let gelesen_bis = src.len();
        let terminator = src[self.naechster_index..gelesen_bis]
            .iter()
            .position(|b| *b == TERMINATOR);

        match terminator {
            Some(offset) => {
                let ende = self.naechster_index + offset;
                self.naechster_index = 0;

                let frame = src.split_to(ende);
                // Terminator verbrauchen
                src.advance(1);

                if frame.len() > self.max_frame_size {
                    return Err(self.zu_gross(frame.len()));
                }
                self.dekodiert += frame.len() + 1;
                Ok(Some(frame))
            }
            None => {
                if gelesen_bis > self.max_frame_size {
                    return Err(self.zu_gross(gelesen_bis));
                }
                self.naechster_index = gelesen_bis;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Unterminierter Rest beim Verbindungsende
        self.naechster_index = 0;
        let laenge = src.len();
        self.dekodiert += laenge;
        Ok(Some(src.split_to(laenge)))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl<T> Encoder<T> for FrameCodec
where
    T: AsRef<[u8]>,
{
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.as_ref();

        if payload.contains(&TERMINATOR) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Nachricht enthaelt ein Null-Byte",
            ));
        }
        if payload.len() > self.max_frame_size {
            return Err(self.zu_gross(payload.len()));
        }

        dst.reserve(payload.len() + 1);
        dst.put_slice(payload);
        dst.put_u8(TERMINATOR);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{Framed, FramedRead};

    #[test]
    fn encode_haengt_terminator_an() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("Ralice", &mut buf).unwrap();
        assert_eq!(&buf[..], b"Ralice\0");
    }

    #[test]
    fn decode_vollstaendige_nachricht() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"200OK\0"[..]);
        let frame = codec.decode(&mut buf).unwrap().expect("Frame erwartet");
        assert_eq!(&frame[..], b"200OK");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_unvollstaendige_nachricht_wartet() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"C bo"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Rest kommt in einem zweiten Read
        buf.extend_from_slice(b"b\0");
        let frame = codec.decode(&mut buf).unwrap().expect("Frame erwartet");
        assert_eq!(&frame[..], b"C bob");
    }

    #[test]
    fn decode_mehrere_nachrichten_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Ralice\0L 127.0.0.1 50010\0"[..]);

        let erste = codec.decode(&mut buf).unwrap().unwrap();
        let zweite = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&erste[..], b"Ralice");
        assert_eq!(&zweite[..], b"L 127.0.0.1 50010");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn dekodierte_bytes_zaehlen_terminator_nur_wenn_vorhanden() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Ralice\0L 127.0.0.1"[..]);

        codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(codec.dekodierte_bytes(), 7);

        // Unterminierter Rest beim Verbindungsende
        let rest = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(&rest[..], b"L 127.0.0.1");
        assert_eq!(codec.dekodierte_bytes(), 7 + 11);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_leere_nachricht() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"\0"[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn decode_ablehnung_zu_grosser_nachricht_ohne_terminator() {
        let mut codec = FrameCodec::with_max_size(8);
        let mut buf = BytesMut::from(&[b'x'; 9][..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn decode_ablehnung_zu_grosser_nachricht_mit_terminator() {
        let mut codec = FrameCodec::with_max_size(4);
        let mut buf = BytesMut::from(&b"Rcharlie\0"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn encode_ablehnung_null_byte_im_payload() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let err = codec.encode(&b"a\0b"[..], &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn encode_ablehnung_zu_grosse_nachricht() {
        let mut codec = FrameCodec::with_max_size(3);
        let mut buf = BytesMut::new();
        assert!(codec.encode("Ralice", &mut buf).is_err());
    }

    #[test]
    fn decode_eof_liefert_unterminierten_rest() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Ubob"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let frame = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"Ubob");
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn frame_codec_default_max_size() {
        let codec = FrameCodec::default();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }

    #[tokio::test]
    async fn framed_ueber_duplex_stream() {
        let (links, rechts) = tokio::io::duplex(64);
        let mut sender = Framed::new(links, FrameCodec::new());
        let mut empfaenger = Framed::new(rechts, FrameCodec::new());

        sender.send("Ralice").await.unwrap();
        sender.send(String::from("L 127.0.0.1 50010")).await.unwrap();

        let erste = empfaenger.next().await.unwrap().unwrap();
        let zweite = empfaenger.next().await.unwrap().unwrap();
        assert_eq!(&erste[..], b"Ralice");
        assert_eq!(&zweite[..], b"L 127.0.0.1 50010");
    }

    #[tokio::test]
    async fn fragmentierte_writes_werden_zusammengesetzt() {
        let (mut links, rechts) = tokio::io::duplex(64);
        let mut leser = FramedRead::new(rechts, FrameCodec::new());

        links.write_all(b"200").await.unwrap();
        links.write_all(b"OK 127.0.0.1").await.unwrap();
        links.write_all(b" 50010\0").await.unwrap();
        drop(links);

        let frame = leser.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"200OK 127.0.0.1 50010");
        assert!(leser.next().await.is_none());
    }
}
