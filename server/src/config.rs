//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use plauder_db::DatabaseConfig;
use plauder_signaling::SignalingConfig;
use serde::Deserialize;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub netzwerk: NetzwerkEinstellungen,
    pub datenbank: DatabaseConfig,
    /// Presence, Routing und Anruf-Vermittlung
    pub signaling: SignalingConfig,
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
    /// Pfad des WebSocket-Endpunkts
    pub ws_pfad: String,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3001,
            ws_pfad: "/ws".into(),
            cors_origins: vec![],
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Bind-Adresse fuer HTTP/WebSocket
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 3001);
        assert_eq!(cfg.netzwerk.ws_pfad, "/ws");
        assert_eq!(cfg.datenbank.url, "sqlite://plauder.db");
        assert_eq!(cfg.signaling.klingel_timeout_sek, 45);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:3001");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 8088

            [signaling]
            klingel_timeout_sek = 20

            [signaling.verlauf]
            maximum = 200

            [logging]
            format = "json"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 8088);
        assert_eq!(cfg.signaling.klingel_timeout_sek, 20);
        assert_eq!(cfg.signaling.verlauf.maximum, 200);
        assert_eq!(cfg.logging.format, "json");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.ws_pfad, "/ws");
        assert_eq!(cfg.signaling.keepalive_sek, 30);
        assert_eq!(cfg.signaling.verlauf.standard, 50);
    }

    #[test]
    fn fehlende_datei_ergibt_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/plauder.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, 3001);
    }
}
