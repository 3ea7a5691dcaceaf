//! plauder-core – Gemeinsame Typen fuer den Echtzeit-Kern
//!
//! Dieses Crate stellt die Identifikationstypen und die Anruf-Enums bereit,
//! die von Protokoll, Datenbank, Router und Client gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{
    AnrufStatus, AnrufTyp, CallId, ConnectionId, MessageId, RoomId, UngueltigerAnrufStatus, UserId,
};
