//! plauder-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, SQLite-Speicher und WebSocket-Server.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use plauder_db::SqliteDb;
use plauder_signaling::{SignalingState, WsServer, WsServerKonfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen und migrieren
    /// 2. Signaling-Zustand aufbauen
    /// 3. WebSocket-Server starten
    /// 4. Auf Ctrl-C warten, dann geordnet herunterfahren
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.bind_adresse()))?;

        let db = SqliteDb::oeffnen(&self.config.datenbank)
            .await
            .context("Datenbank konnte nicht geoeffnet werden")?;
        let db = Arc::new(db);

        let state = SignalingState::neu(self.config.signaling.clone(), Arc::clone(&db));
        let server = WsServer::neu(
            state,
            WsServerKonfig {
                bind_addr,
                ws_pfad: self.config.netzwerk.ws_pfad.clone(),
                cors_origins: self.config.netzwerk.cors_origins.clone(),
            },
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Signal-Handler fehlgeschlagen, Server wird beendet"),
            }
            let _ = shutdown_tx.send(true);
        });

        tracing::info!(adresse = %bind_addr, "Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        server
            .starten(shutdown_rx)
            .await
            .context("WebSocket-Server abgebrochen")?;

        db.schliessen().await;
        tracing::info!("Server beendet");
        Ok(())
    }
}
