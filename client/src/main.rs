//! Rendezvous Client – Einstiegspunkt
//!
//! Zwei Modi:
//! - `listen`: registriert sich, kuendigt den eigenen Chat-Endpunkt an und
//!   bedient eingehende Chats bis Ctrl-C, danach Abmeldung
//! - `connect`: registriert sich, fragt den Endpunkt eines Benutzers ab und
//!   chattet ueber stdin/stdout, danach Abmeldung
//!
//! Logs gehen nach stderr, damit der Chat auf stdout lesbar bleibt.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rendezvous_client::{abmelden, als_lauschend_anmelden, chat, verbindung_anfragen, ClientError};
use rendezvous_core::{Endpoint, Username, DYNAMIC_PORT_RANGE};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

/// Versuche fuer einen zufaellig gewaehlten Chat-Port
const PORT_VERSUCHE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Modus {
    /// Auf eingehende Chats warten
    Listen,
    /// Mit einem lauschenden Benutzer verbinden
    Connect,
}

/// Chat-Client fuer den Rendezvous-Verzeichnisdienst
#[derive(Debug, Parser)]
#[command(name = "rendezvous-client", version)]
struct Args {
    /// Betriebsmodus
    #[arg(short, long, value_enum)]
    mode: Modus,

    /// Eigener Benutzername
    #[arg(short, long, value_parser = benutzername_parsen)]
    username: Username,

    /// Benutzer mit dem gechattet werden soll (nur connect)
    #[arg(
        short = 'c',
        long = "connect-to",
        value_parser = benutzername_parsen,
        required_if_eq("mode", "connect")
    )]
    connect_to: Option<Username>,

    /// Angekuendigte IP-Adresse (nur listen, Standard: 127.0.0.1)
    #[arg(short, long)]
    ip: Option<IpAddr>,

    /// Chat-Port 49152-65535 (nur listen, Standard: zufaellig)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(49152..=65535))]
    port: Option<u16>,

    /// Adresse des Verzeichnisdienstes
    #[arg(long, default_value = "127.0.0.1")]
    server_host: IpAddr,

    /// Port des Verzeichnisdienstes
    #[arg(long, default_value_t = 29000)]
    server_port: u16,
}

fn benutzername_parsen(roh: &str) -> Result<Username, String> {
    Username::parse(roh).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging_initialisieren();

    match ausfuehren(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fehler: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialisiert tracing-subscriber auf stderr (Standard: warn)
fn logging_initialisieren() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("RV_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn ausfuehren(args: Args) -> Result<()> {
    let server = SocketAddr::new(args.server_host, args.server_port);

    match args.mode {
        Modus::Listen => {
            lauschen_modus(server, args.username, angekuendigte_ip(args.ip), args.port).await
        }
        Modus::Connect => {
            let ziel = args
                .connect_to
                .context("Im connect-Modus ist -c/--connect-to erforderlich")?;
            verbinden_modus(server, args.username, ziel).await
        }
    }
}

/// Ohne `-i` wird 127.0.0.1 angekuendigt
fn angekuendigte_ip(ip: Option<IpAddr>) -> IpAddr {
    ip.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn zufaelliger_port() -> u16 {
    let start = *DYNAMIC_PORT_RANGE.start();
    let spanne = DYNAMIC_PORT_RANGE.end() - start + 1;
    start + rand::random::<u16>() % spanne
}

/// Bindet den Chat-Listener; ohne festen Port mehrere zufaellige Versuche
async fn chat_listener_binden(ip: IpAddr, port: Option<u16>) -> Result<(TcpListener, Endpoint)> {
    let versuche = if port.is_some() { 1 } else { PORT_VERSUCHE };
    let mut letzter_fehler = None;

    for _ in 0..versuche {
        let endpoint = Endpoint::im_dynamischen_bereich(ip, port.unwrap_or_else(zufaelliger_port))?;
        match TcpListener::bind(endpoint.socket_addr()).await {
            Ok(listener) => return Ok((listener, endpoint)),
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, fehler = %e, "Chat-Port nicht verfuegbar");
                letzter_fehler = Some(e);
            }
        }
    }

    Err(anyhow::anyhow!(
        "Chat-Listener konnte nicht gebunden werden: {}",
        letzter_fehler.map(|e| e.to_string()).unwrap_or_default()
    ))
}

async fn lauschen_modus(
    server: SocketAddr,
    username: Username,
    ip: IpAddr,
    port: Option<u16>,
) -> Result<()> {
    let (listener, endpoint) = chat_listener_binden(ip, port).await?;

    als_lauschend_anmelden(server, &username, endpoint)
        .await
        .with_context(|| format!("Anmeldung bei {server} fehlgeschlagen"))?;
    println!("Lausche als '{username}' auf {endpoint} (Ctrl-C beendet)");

    let mut stdout = tokio::io::stdout();
    let ergebnis = chat::lauschen(listener, &mut stdout, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    abmelden(server, &username)
        .await
        .context("Abmeldung fehlgeschlagen")?;
    ergebnis.context("Fehler beim Lauschen")?;
    Ok(())
}

async fn verbinden_modus(server: SocketAddr, username: Username, ziel: Username) -> Result<()> {
    let endpoint = match verbindung_anfragen(server, &username, &ziel).await {
        Ok(e) => e,
        Err(ClientError::Abgelehnt { status, .. }) if status.code() == 404 => {
            // Server hat den eigenen Eintrag bereits entfernt
            anyhow::bail!("Benutzer '{ziel}' ist nicht registriert oder lauscht nicht");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Anfrage bei {server} fehlgeschlagen"));
        }
    };
    tracing::info!(ziel = %ziel, endpoint = %endpoint, "Endpunkt erhalten");

    let chat_ergebnis = async {
        let stream = TcpStream::connect(endpoint.socket_addr())
            .await
            .with_context(|| format!("Verbindung zu {endpoint} fehlgeschlagen"))?;

        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        tokio::select! {
            ergebnis = chat::chatten(stream, &username, &ziel, stdin, &mut stdout) => {
                ergebnis.context("Chat abgebrochen")
            }
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    }
    .await;

    abmelden(server, &username)
        .await
        .context("Abmeldung fehlgeschlagen")?;
    chat_ergebnis
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// Bindet einen Listener auf einem freien Port im dynamischen Bereich
    async fn belegter_dynamischer_port() -> (TcpListener, u16) {
        loop {
            let port = zufaelliger_port();
            if let Ok(listener) = TcpListener::bind((LOCALHOST, port)).await {
                return (listener, port);
            }
        }
    }

    #[test]
    fn zufaellige_ports_im_dynamischen_bereich() {
        for _ in 0..10_000 {
            assert!(DYNAMIC_PORT_RANGE.contains(&zufaelliger_port()));
        }
    }

    #[test]
    fn ohne_ip_wird_loopback_angekuendigt() {
        assert_eq!(angekuendigte_ip(None), LOCALHOST);
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(angekuendigte_ip(Some(ip)), ip);
    }

    #[tokio::test]
    async fn fester_port_wird_exakt_gebunden() {
        let (belegt, port) = belegter_dynamischer_port().await;
        drop(belegt);

        let (listener, endpoint) = chat_listener_binden(LOCALHOST, Some(port)).await.unwrap();
        assert_eq!(endpoint.port, port);
        assert_eq!(endpoint.address, LOCALHOST);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn belegter_fester_port_ohne_ausweichen() {
        let (_belegt, port) = belegter_dynamischer_port().await;

        // Kein zufaelliger Ersatzport wenn -p angegeben ist
        assert!(chat_listener_binden(LOCALHOST, Some(port)).await.is_err());
    }

    #[tokio::test]
    async fn ohne_port_zufaellig_im_dynamischen_bereich() {
        let (_listener, endpoint) = chat_listener_binden(LOCALHOST, None).await.unwrap();
        assert!(DYNAMIC_PORT_RANGE.contains(&endpoint.port));
        assert_eq!(endpoint.address, LOCALHOST);
    }
}
