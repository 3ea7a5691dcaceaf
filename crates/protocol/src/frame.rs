//! Frame-Format fuer WebSocket-Textnachrichten
//!
//! Jede Textnachricht ist ein JSON-Objekt:
//!
//! ```text
//! { "request_id": 7 | null, "event": "<name>", "data": { ... } }
//! ```
//!
//! `request_id` vergibt der Client. Der Server kopiert sie in die `ack`-
//! Antwort, damit der Client Request und Quittung zuordnen kann. Vom Server
//! initiierte Pushes tragen `request_id: null`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

const REQUEST_ID_FELD: &str = "request_id";

/// Fehler beim Kodieren/Dekodieren von Frames
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    #[error("Frame zu gross: {groesse} Bytes (Maximum: {max} Bytes)")]
    FrameZuGross { groesse: usize, max: usize },

    /// Kein gueltiges JSON-Objekt
    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(String),

    /// Gueltiges JSON, aber unbekanntes Event oder fehlerhafte Nutzdaten.
    /// Die `request_id` bleibt erhalten, damit eine Fehler-Quittung moeglich ist.
    #[error("Ungueltiges Event: {grund}")]
    UngueltigesEvent {
        request_id: Option<u32>,
        grund: String,
    },

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),
}

impl ProtokollFehler {
    /// Request-ID des fehlerhaften Frames, falls sie lesbar war
    pub fn request_id(&self) -> Option<u32> {
        match self {
            Self::UngueltigesEvent { request_id, .. } => *request_id,
            _ => None,
        }
    }
}

/// Ein Frame mit optionaler Request-ID und typisiertem Event
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<E> {
    pub request_id: Option<u32>,
    pub event: E,
}

/// Client -> Server
pub type ClientFrame = Frame<ClientEvent>;
/// Server -> Client
pub type ServerFrame = Frame<ServerEvent>;

impl<E> Frame<E> {
    /// Frame als Antwort auf einen Request
    pub fn antwort(request_id: u32, event: E) -> Self {
        Self {
            request_id: Some(request_id),
            event,
        }
    }

    /// Vom Absender initiierter Frame ohne Request-Bezug
    pub fn push(event: E) -> Self {
        Self {
            request_id: None,
            event,
        }
    }
}

impl<E: Serialize> Frame<E> {
    /// Serialisiert den Frame als JSON-Text
    pub fn to_json(&self) -> Result<String, ProtokollFehler> {
        let mut value = serde_json::to_value(&self.event)?;
        if let serde_json::Value::Object(ref mut map) = value {
            map.insert(
                REQUEST_ID_FELD.to_string(),
                serde_json::to_value(self.request_id)?,
            );
        }
        Ok(serde_json::to_string(&value)?)
    }
}

impl<E: DeserializeOwned> Frame<E> {
    /// Dekodiert einen Frame aus JSON-Text und validiert das Event
    pub fn from_json(json: &str, max_frame_size: usize) -> Result<Self, ProtokollFehler> {
        if json.len() > max_frame_size {
            return Err(ProtokollFehler::FrameZuGross {
                groesse: json.len(),
                max: max_frame_size,
            });
        }

        let mut value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ProtokollFehler::UngueltigesJson(e.to_string()))?;

        let map = value
            .as_object_mut()
            .ok_or_else(|| ProtokollFehler::UngueltigesJson("Frame ist kein Objekt".into()))?;

        // request_id vor der Event-Dekodierung entfernen, damit sie auch bei
        // fehlerhaften Nutzdaten fuer die Fehler-Quittung verfuegbar bleibt
        let request_id = map
            .remove(REQUEST_ID_FELD)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok());

        let event = serde_json::from_value(value).map_err(|e| ProtokollFehler::UngueltigesEvent {
            request_id,
            grund: e.to_string(),
        })?;

        Ok(Self { request_id, event })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ErrorCode, Quittung, RoomRequest};
    use plauder_core::types::RoomId;

    #[test]
    fn client_frame_mit_request_id() {
        let raum = RoomId::new();
        let frame = ClientFrame::antwort(3, ClientEvent::JoinRoom(RoomRequest { room_id: raum }));
        let json = frame.to_json().unwrap();
        assert!(json.contains("\"request_id\":3"));
        assert!(json.contains("\"event\":\"joinRoom\""));

        let decoded = ClientFrame::from_json(&json, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(decoded.request_id, Some(3));
        assert!(matches!(decoded.event, ClientEvent::JoinRoom(ref r) if r.room_id == raum));
    }

    #[test]
    fn push_frame_hat_null_request_id() {
        let frame = ServerFrame::push(ServerEvent::OnlineUsers(vec![]));
        let json = frame.to_json().unwrap();
        assert!(json.contains("\"request_id\":null"));
    }

    #[test]
    fn fehlerhafte_nutzdaten_behalten_request_id() {
        let json = r#"{"request_id": 9, "event": "getChatHistory", "data": {}}"#;
        let fehler = ClientFrame::from_json(json, DEFAULT_MAX_FRAME_SIZE).unwrap_err();
        assert!(matches!(fehler, ProtokollFehler::UngueltigesEvent { .. }));
        assert_eq!(fehler.request_id(), Some(9));
    }

    #[test]
    fn kein_json_objekt() {
        let fehler = ClientFrame::from_json("[1,2,3]", DEFAULT_MAX_FRAME_SIZE).unwrap_err();
        assert!(matches!(fehler, ProtokollFehler::UngueltigesJson(_)));
        assert_eq!(fehler.request_id(), None);
    }

    #[test]
    fn zu_grosser_frame_wird_abgelehnt() {
        let json = format!(
            r#"{{"event":"joinRoom","data":{{"roomId":"{}"}}}}"#,
            RoomId::new().inner()
        );
        let fehler = ClientFrame::from_json(&json, 10).unwrap_err();
        assert!(matches!(fehler, ProtokollFehler::FrameZuGross { max: 10, .. }));
    }

    #[test]
    fn server_ack_dekodierbar_fuer_client() {
        let frame = ServerFrame::antwort(
            1,
            ServerEvent::Ack(Quittung::fehler(ErrorCode::PeerUnavailable, "offline")),
        );
        let json = frame.to_json().unwrap();
        let decoded = ServerFrame::from_json(&json, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(decoded, frame);
    }
}
