//! plauder-signaling – Echtzeit-Router fuer Chat und Anrufe
//!
//! Dieser Crate verwaltet WebSocket-Verbindungen, haelt fest wer online ist
//! und verteilt Chat-Nachrichten und WebRTC-Signale (Offer, Answer, ICE)
//! an die Verbindungen der beteiligten Benutzer.
//!
//! ## Architektur
//!
//! ```text
//! WsServer (axum, GET /ws?userId=..)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein lokaler Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- chat_handler      (sendMessage, sendRoomMessage, getChatHistory)
//!     +-- room_handler      (joinRoom, leaveRoom)
//!     +-- presence_handler  (Verbinden, Trennen, getOnlineUsers)
//!     +-- call_handler      (startCall, answerCall, iceCandidate, endCall, ...)
//!
//! PresenceRegistry – Benutzer -> Verbindungen
//! EventBroadcaster – Send-Queues und Raum-Mitgliedschaften
//! AnrufRegister    – aktive Anruf-Sessions, ein Anruf pro Benutzerpaar
//! ```

pub mod broadcast;
pub mod calls;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use calls::{AnrufRegister, AnrufSession};
pub use connection::ClientConnection;
pub use dispatcher::{MessageDispatcher, VerbindungsKontext};
pub use error::{SignalingError, SignalingResult};
pub use presence::PresenceRegistry;
pub use server_state::{SignalingConfig, SignalingState, Speicher};
pub use ws::{HealthResponse, WsServer, WsServerKonfig};
