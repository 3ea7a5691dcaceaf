//! plauder-protocol – Socket-Event-Definitionen
//!
//! Dieses Crate definiert alle Events die zwischen Client und Server ueber
//! die WebSocket-Verbindung ausgetauscht werden, sowie das Frame-Format.

pub mod events;
pub mod frame;

pub use events::{ClientEvent, ErrorCode, LeereAnfrage, ServerEvent};
pub use frame::{ClientFrame, Frame, ProtokollFehler, ServerFrame};
