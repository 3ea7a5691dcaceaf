//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Konfiguration, Speicher, Chat-Service und die beiden einzigen
//! geteilten In-Memory-Zustaende (Presence-Registry, Anruf-Register).
//! Alles wird pro Prozess einmal erzeugt und explizit weitergereicht.

use plauder_chat::{ChatService, VerlaufLimits};
use plauder_db::{CallRepository, MessageRepository, RoomRepository};
use plauder_protocol::frame::DEFAULT_MAX_FRAME_SIZE;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::EventBroadcaster;
use crate::calls::AnrufRegister;
use crate::presence::PresenceRegistry;

/// Alle Speicher-Faehigkeiten die der Router konsumiert
pub trait Speicher: MessageRepository + RoomRepository + CallRepository + 'static {}

impl<T> Speicher for T where T: MessageRepository + RoomRepository + CallRepository + 'static {}

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer stille Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Unbeantwortete Anrufe enden danach als `missed`
    pub klingel_timeout_sek: u64,
    /// Groesse der ausgehenden Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Groesse eines eingehenden Frames in Bytes
    pub max_frame_groesse: usize,
    /// Seitengroessen fuer `getChatHistory`
    pub verlauf: VerlaufLimits,
    /// Maximale Anzahl Eintraege fuer `getCallHistory`
    pub anruf_verlauf_limit: u32,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            klingel_timeout_sek: 45,
            send_queue_groesse: 64,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
            verlauf: VerlaufLimits::default(),
            anruf_verlauf_limit: 50,
        }
    }
}

impl SignalingConfig {
    pub fn klingel_timeout(&self) -> Duration {
        Duration::from_secs(self.klingel_timeout_sek)
    }
}

/// Gemeinsamer Server-Zustand (Arc-geteilt)
pub struct SignalingState<R: Speicher> {
    pub config: Arc<SignalingConfig>,
    /// Speicher fuer Anrufe (Nachrichten laufen ueber den Chat-Service)
    pub db: Arc<R>,
    pub chat_service: Arc<ChatService<R>>,
    /// Wer ist mit welchen Verbindungen online
    pub presence: PresenceRegistry,
    /// Send-Queues und Raum-Mitgliedschaften
    pub broadcaster: EventBroadcaster,
    /// Aktive Anruf-Sessions
    pub anrufe: AnrufRegister,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl<R: Speicher> SignalingState<R> {
    pub fn neu(config: SignalingConfig, db: Arc<R>) -> Arc<Self> {
        let chat_service = ChatService::mit_limits(Arc::clone(&db), config.verlauf);
        Arc::new(Self {
            config: Arc::new(config),
            db,
            chat_service,
            presence: PresenceRegistry::neu(),
            broadcaster: EventBroadcaster::neu(),
            anrufe: AnrufRegister::neu(),
            start_time: Instant::now(),
        })
    }

    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_konfiguration() {
        let cfg = SignalingConfig::default();
        assert_eq!(cfg.keepalive_sek, 30);
        assert_eq!(cfg.verbindungs_timeout_sek, 90);
        assert_eq!(cfg.klingel_timeout(), Duration::from_secs(45));
        assert_eq!(cfg.send_queue_groesse, 64);
        assert_eq!(cfg.verlauf.standard, 50);
        assert_eq!(cfg.verlauf.maximum, 100);
    }
}
