//! Rendezvous Server – Einstiegspunkt
//!
//! Parst die Kommandozeile, laedt die Konfiguration, initialisiert das
//! Logging und startet den Server.

use anyhow::Result;
use clap::Parser;
use rendezvous_observability::logging_initialisieren;
use rendezvous_server::{
    config::{ConfigQuelle, ServerConfig},
    Server,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Rendezvous-Verzeichnisdienst fuer Peer-to-Peer-Chats
#[derive(Debug, Parser)]
#[command(name = "rendezvous-server", version)]
struct Args {
    /// TCP-Port des Verzeichnisdienstes (Standard: 29000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Auf allen Schnittstellen lauschen statt nur auf Loopback
    #[arg(short = 'a', long = "any")]
    alle_schnittstellen: bool,

    /// Pfad zur TOML-Konfigurationsdatei
    #[arg(short, long, env = "RENDEZVOUS_CONFIG", default_value = "rendezvous.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help und --version sind kein Fehler
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match ausfuehren(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(fehler = %format!("{e:#}"), "Server beendet mit Fehler");
            eprintln!("Fehler: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn ausfuehren(args: Args) -> Result<()> {
    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let (mut config, quelle) = ServerConfig::laden(&args.config)?;

    // Kommandozeile hat Vorrang
    if let Some(port) = args.port {
        config.netzwerk.port = port;
    }
    if args.alle_schnittstellen {
        config.netzwerk.alle_schnittstellen = true;
    }
    config.validieren()?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    if quelle == ConfigQuelle::Standardwerte {
        tracing::warn!(
            pfad = %args.config.display(),
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "Rendezvous Server wird initialisiert"
    );

    let server = Server::binden(config).await?;
    server.starten().await
}
