//! Oeffentliche Typen fuer den Chat-Service

use chrono::{DateTime, Utc};
use plauder_core::types::{MessageId, RoomId, UserId};
use plauder_db::models::NachrichtRecord;
use serde::Deserialize;

/// Eine gespeicherte Chat-Nachricht (Domain-Typ, nicht DB-Record)
#[derive(Debug, Clone, PartialEq)]
pub struct ChatNachricht {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    /// Nur bei privaten Nachrichten gesetzt
    pub receiver_id: Option<UserId>,
    pub text: String,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<NachrichtRecord> for ChatNachricht {
    fn from(r: NachrichtRecord) -> Self {
        Self {
            id: r.id,
            room_id: r.room_id,
            sender_id: r.sender_id,
            receiver_id: r.receiver_id,
            text: r.text,
            attachment: r.attachment,
            created_at: r.created_at,
        }
    }
}

/// Cursor-basierte Paginierung fuer den Verlauf
#[derive(Debug, Clone)]
pub struct HistoryAnfrage {
    pub room_id: RoomId,
    /// Lade Nachrichten vor diesem Zeitstempel
    pub before: Option<DateTime<Utc>>,
    /// Gewuenschte Anzahl (ohne Angabe: Standard-Limit)
    pub limit: Option<u32>,
}

/// Seitengroessen fuer den Verlauf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerlaufLimits {
    pub standard: u32,
    pub maximum: u32,
}

impl Default for VerlaufLimits {
    fn default() -> Self {
        Self {
            standard: 50,
            maximum: 100,
        }
    }
}

impl VerlaufLimits {
    /// Effektives Limit: Standard ohne Angabe, sonst 1..=maximum
    pub fn anwenden(&self, gewuenscht: Option<u32>) -> u32 {
        gewuenscht
            .unwrap_or(self.standard)
            .clamp(1, self.maximum.max(1))
    }
}
