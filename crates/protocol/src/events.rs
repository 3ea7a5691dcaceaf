//! Socket-Events (WebSocket, JSON)
//!
//! Definiert alle Events die zwischen Client und Server ausgetauscht werden.
//!
//! ## Design
//! - Geschlossene Menge von Tagged Enums statt dynamischer Payloads
//! - Event-Name im Feld `event`, Nutzdaten im Feld `data`
//! - Alte Event-Namen (`sendPrivateMessage`, `callUser`, `answerCall`)
//!   werden als Alias akzeptiert
//! - Antworten auf Requests laufen ueber `ack` mit derselben `request_id`

use chrono::{DateTime, Utc};
use plauder_core::types::{AnrufStatus, AnrufTyp, CallId, MessageId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// Undurchsichtige WebRTC-Signaldaten (SDP, ICE-Kandidat).
/// Der Server leitet sie nur weiter und interpretiert sie nie.
pub type Signal = serde_json::Value;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer fehlgeschlagene Quittungen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Fehlendes oder fehlerhaftes Pflichtfeld
    InvalidArgument,
    /// Anruf/Nachricht existiert nicht (oder ist bereits beendet)
    NotFound,
    /// Speicherung fehlgeschlagen, nichts wurde verteilt
    PersistenceFailure,
    /// Ziel-Benutzer hat keine aktive Verbindung
    PeerUnavailable,
    /// Fuer dieses Benutzerpaar laeuft bereits ein Anruf
    CallBusy,
    InternalError,
}

/// Fehler-Details einer Quittung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Gemeinsame Nutzdaten
// ---------------------------------------------------------------------------

/// Persistierte Nachricht wie sie an Clients ausgeliefert wird
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender_id: UserId,
    /// Nur bei privaten Nachrichten gesetzt
    #[serde(default)]
    pub receiver_id: Option<UserId>,
    pub chat_room_id: RoomId,
    pub text: String,
    #[serde(default)]
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Anruf-Informationen (Quittung fuer startCall/endCall, Anruf-Verlauf)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInfo {
    pub call_id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub call_type: AnrufTyp,
    pub status: AnrufStatus,
    pub started_at: DateTime<Utc>,
    /// Dauer in Sekunden (0 solange der Anruf laeuft)
    #[serde(default)]
    pub duration_secs: u64,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Private Nachricht senden (`sendMessage` / `sendPrivateMessage`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    /// Bereits bekannter 1:1-Raum (sonst wird er aufgeloest/angelegt)
    #[serde(default)]
    pub chat_room_id: Option<RoomId>,
    #[serde(default)]
    pub attachment: Option<String>,
    /// Temporaere Client-ID, wird in Quittung und Broadcast zurueckgespiegelt
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// Gruppen-Nachricht in einen bestehenden Raum senden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRoomMessageRequest {
    pub sender_id: UserId,
    pub room_id: RoomId,
    pub text: String,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// Raum betreten/verlassen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub room_id: RoomId,
}

/// Nachrichten-Verlauf eines Raums laden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryRequest {
    #[serde(alias = "chatRoomId")]
    pub room_id: RoomId,
    /// Nur Nachrichten vor diesem Zeitpunkt (Cursor-Pagination)
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Anruf starten (`startCall` / `callUser`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallRequest {
    pub caller_id: UserId,
    pub user_to_call: UserId,
    /// SDP-Offer des Anrufers
    pub signal_data: Signal,
    pub call_type: AnrufTyp,
}

/// Anruf annehmen (`answerCall` / `callAccepted`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCallRequest {
    pub call_id: CallId,
    /// SDP-Answer des Angerufenen
    pub signal: Signal,
}

/// ICE-Kandidat (beide Richtungen)
///
/// Client -> Server: `user_id` ist das Ziel.
/// Server -> Client: `user_id` ist der Absender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateMessage {
    pub call_id: CallId,
    pub candidate: Signal,
    pub user_id: UserId,
}

/// Anruf beenden
///
/// `status` bleibt ein String, damit ungueltige Werte im Router als
/// `InvalidArgument` beantwortet werden koennen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCallRequest {
    pub call_id: CallId,
    pub status: String,
}

/// Anruf ablehnen (Kurzform fuer endCall mit `declined`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclineCallRequest {
    pub call_id: CallId,
}

/// Nutzdaten fuer Events ohne Parameter
///
/// Akzeptiert `{}` (mit beliebigen, ignorierten Feldern), `null` und ein
/// fehlendes `data`-Feld. Serialisiert wird als `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeereAnfrage;

impl Serialize for LeereAnfrage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        serializer.serialize_map(Some(0))?.end()
    }
}

impl<'de> Deserialize<'de> for LeereAnfrage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LeerVisitor;

        impl<'de> serde::de::Visitor<'de> for LeerVisitor {
            type Value = LeereAnfrage;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("ein leeres Objekt oder null")
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<LeereAnfrage, E> {
                Ok(LeereAnfrage)
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<LeereAnfrage, E> {
                Ok(LeereAnfrage)
            }

            fn visit_some<D: serde::Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<LeereAnfrage, D::Error> {
                let inhalt = serde_json::Value::deserialize(deserializer)?;
                match inhalt {
                    serde_json::Value::Object(_) | serde_json::Value::Null => Ok(LeereAnfrage),
                    andere => Err(serde::de::Error::invalid_type(
                        serde::de::Unexpected::Other(&andere.to_string()),
                        &self,
                    )),
                }
            }
        }

        // Option-Pfad: ein fehlendes `data`-Feld landet in visit_none
        deserializer.deserialize_option(LeerVisitor)
    }
}

/// Alle Events die ein Client senden darf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "sendMessage", alias = "sendPrivateMessage")]
    SendMessage(SendMessageRequest),
    #[serde(rename = "sendRoomMessage")]
    SendRoomMessage(SendRoomMessageRequest),
    #[serde(rename = "joinRoom")]
    JoinRoom(RoomRequest),
    #[serde(rename = "leaveRoom")]
    LeaveRoom(RoomRequest),
    #[serde(rename = "getChatHistory")]
    GetChatHistory(ChatHistoryRequest),
    #[serde(rename = "getOnlineUsers")]
    GetOnlineUsers(LeereAnfrage),
    #[serde(rename = "startCall", alias = "callUser")]
    StartCall(StartCallRequest),
    #[serde(rename = "answerCall", alias = "callAccepted")]
    AnswerCall(AnswerCallRequest),
    #[serde(rename = "iceCandidate")]
    IceCandidate(IceCandidateMessage),
    #[serde(rename = "endCall")]
    EndCall(EndCallRequest),
    #[serde(rename = "declineCall")]
    DeclineCall(DeclineCallRequest),
    #[serde(rename = "getCallHistory")]
    GetCallHistory(LeereAnfrage),
}

impl ClientEvent {
    /// Kanonischer Event-Name (fuer Logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "sendMessage",
            Self::SendRoomMessage(_) => "sendRoomMessage",
            Self::JoinRoom(_) => "joinRoom",
            Self::LeaveRoom(_) => "leaveRoom",
            Self::GetChatHistory(_) => "getChatHistory",
            Self::GetOnlineUsers(_) => "getOnlineUsers",
            Self::StartCall(_) => "startCall",
            Self::AnswerCall(_) => "answerCall",
            Self::IceCandidate(_) => "iceCandidate",
            Self::EndCall(_) => "endCall",
            Self::DeclineCall(_) => "declineCall",
            Self::GetCallHistory(_) => "getCallHistory",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Quittung auf einen Request (Acknowledgment-Callback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quittung {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl Quittung {
    /// Erfolgreiche Quittung mit optionalen Nutzdaten
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::fehler(
                ErrorCode::InternalError,
                format!("Antwort nicht serialisierbar: {e}"),
            ),
        }
    }

    /// Fehlgeschlagene Quittung
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorResponse {
                code,
                message: message.into(),
            }),
        }
    }

    /// Fehler-Code falls die Quittung fehlgeschlagen ist
    pub fn fehler_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// Eine zugestellte Chat-Nachricht (`privateMessage` / `roomMessage`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub success: bool,
    pub message: MessageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

/// Online-/Offline-Wechsel eines Benutzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub user_id: UserId,
}

/// Mitgliedschaft in einem Raum hat sich geaendert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembershipEvent {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined: bool,
}

/// Eingehender Anruf beim Angerufenen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallEvent {
    pub call_id: CallId,
    pub from: UserId,
    pub call_type: AnrufTyp,
    /// SDP-Offer des Anrufers
    pub signal: Signal,
}

/// Angerufener hat angenommen (an den Anrufer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptedEvent {
    pub call_id: CallId,
    pub signal: Signal,
    pub answerer_id: UserId,
}

/// Anruf wurde beendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndedEvent {
    pub call_id: CallId,
    pub status: AnrufStatus,
    /// None wenn der Server den Anruf beendet hat (Timeout, Verbindungsabbruch)
    #[serde(default)]
    pub ended_by: Option<UserId>,
}

/// Alle Events die der Server an Clients sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "ack")]
    Ack(Quittung),
    #[serde(rename = "privateMessage")]
    PrivateMessage(MessageEvent),
    #[serde(rename = "roomMessage")]
    RoomMessage(MessageEvent),
    #[serde(rename = "onlineUsers")]
    OnlineUsers(Vec<UserId>),
    #[serde(rename = "userOnline")]
    UserOnline(PresenceChange),
    #[serde(rename = "userOffline")]
    UserOffline(PresenceChange),
    #[serde(rename = "roomMembership")]
    RoomMembership(RoomMembershipEvent),
    #[serde(rename = "incomingCall")]
    IncomingCall(IncomingCallEvent),
    #[serde(rename = "callAccepted")]
    CallAccepted(CallAcceptedEvent),
    #[serde(rename = "iceCandidate")]
    IceCandidate(IceCandidateMessage),
    #[serde(rename = "callEnded")]
    CallEnded(CallEndedEvent),
}

impl ServerEvent {
    /// Event-Name (fuer Logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ack(_) => "ack",
            Self::PrivateMessage(_) => "privateMessage",
            Self::RoomMessage(_) => "roomMessage",
            Self::OnlineUsers(_) => "onlineUsers",
            Self::UserOnline(_) => "userOnline",
            Self::UserOffline(_) => "userOffline",
            Self::RoomMembership(_) => "roomMembership",
            Self::IncomingCall(_) => "incomingCall",
            Self::CallAccepted(_) => "callAccepted",
            Self::IceCandidate(_) => "iceCandidate",
            Self::CallEnded(_) => "callEnded",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
