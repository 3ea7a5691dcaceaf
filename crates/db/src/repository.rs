//! Repository-Traits
//!
//! Der Echtzeit-Kern besitzt keinen Speicher. Alle Zugriffe laufen ueber
//! diese Traits, damit Tests eigene Implementierungen (z.B. einen
//! absichtlich fehlschlagenden Speicher) einsetzen koennen.

use plauder_core::types::{AnrufStatus, CallId, RoomId, UserId};
use serde::Deserialize;

use crate::error::DbError;
use crate::models::{
    AnrufRecord, NachrichtRecord, NachrichtenFilter, NeueNachricht, NeuerAnruf, RaumRecord,
};

/// Result-Alias fuer Datenbankoperationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration der Datenbankverbindung
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://plauder.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob der WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://plauder.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Nachrichten speichern und Verlauf lesen
#[allow(async_fn_in_trait)]
pub trait MessageRepository: Send + Sync {
    /// Speichert eine Nachricht; ID und Zeitstempel vergibt der Speicher
    async fn save_message(&self, data: NeueNachricht<'_>) -> DbResult<NachrichtRecord>;

    /// Verlauf eines Raums, chronologisch (aelteste zuerst)
    async fn find_history(&self, filter: NachrichtenFilter) -> DbResult<Vec<NachrichtRecord>>;
}

/// 1:1-Raeume aufloesen, Gruppen anlegen
#[allow(async_fn_in_trait)]
pub trait RoomRepository: Send + Sync {
    /// Findet den privaten Raum fuer das ungeordnete Paar (a, b) oder legt ihn an
    async fn find_or_create_private_room(&self, a: UserId, b: UserId) -> DbResult<RaumRecord>;

    async fn get_room(&self, id: RoomId) -> DbResult<Option<RaumRecord>>;

    async fn create_group_room(&self, name: &str) -> DbResult<RaumRecord>;
}

/// Anrufe anlegen und abschliessen
#[allow(async_fn_in_trait)]
pub trait CallRepository: Send + Sync {
    async fn create_call(&self, data: NeuerAnruf) -> DbResult<AnrufRecord>;

    /// Schreibt den Endstatus eines Anrufs
    async fn update_call_status(
        &self,
        id: CallId,
        status: AnrufStatus,
        duration_secs: u64,
    ) -> DbResult<AnrufRecord>;

    /// Anrufe an denen der Benutzer beteiligt war, neueste zuerst
    async fn calls_for_user(&self, user_id: UserId, limit: u32) -> DbResult<Vec<AnrufRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_standard() {
        let cfg = DatabaseConfig::default();
        assert_eq!(cfg.url, "sqlite://plauder.db");
        assert!(cfg.sqlite_wal);
        assert_eq!(cfg.max_verbindungen, 5);
    }

    #[test]
    fn database_config_teilweise_aus_toml() {
        let cfg: DatabaseConfig = toml::from_str("url = \"sqlite::memory:\"").unwrap();
        assert_eq!(cfg.url, "sqlite::memory:");
        assert_eq!(cfg.max_verbindungen, 5);
    }
}
