//! Datenbank-Modelle (Records)
//!
//! Records sind die Zeilen wie sie gespeichert sind. Die Protokoll-Typen
//! (`MessageInfo`, `CallInfo`) werden im Signaling-Crate daraus gebaut.

use chrono::{DateTime, Utc};
use plauder_core::types::{AnrufStatus, AnrufTyp, CallId, MessageId, RoomId, UserId};

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

/// Art eines Chat-Raums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaumTyp {
    /// 1:1-Unterhaltung zwischen genau zwei Benutzern
    Privat,
    /// Gruppen-Chat, Zustellung ueber Raum-Mitgliedschaft
    Gruppe,
}

impl RaumTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Privat => "private",
            Self::Gruppe => "group",
        }
    }

    pub fn aus_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Privat),
            "group" => Some(Self::Gruppe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaumRecord {
    pub id: RoomId,
    pub typ: RaumTyp,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Daten fuer eine neue Nachricht
#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub room_id: RoomId,
    pub sender_id: UserId,
    /// Nur bei privaten Nachrichten gesetzt
    pub receiver_id: Option<UserId>,
    pub text: &'a str,
    pub attachment: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NachrichtRecord {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub text: String,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter fuer den Nachrichten-Verlauf
#[derive(Debug, Clone)]
pub struct NachrichtenFilter {
    pub room_id: RoomId,
    /// Nur Nachrichten die vor diesem Zeitpunkt erstellt wurden
    pub before: Option<DateTime<Utc>>,
    pub limit: u32,
}

// ---------------------------------------------------------------------------
// Anrufe
// ---------------------------------------------------------------------------

/// Daten fuer einen neuen Anruf (Status ist immer `ongoing`)
#[derive(Debug, Clone)]
pub struct NeuerAnruf {
    pub id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub call_type: AnrufTyp,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnrufRecord {
    pub id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub call_type: AnrufTyp,
    pub status: AnrufStatus,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
}
