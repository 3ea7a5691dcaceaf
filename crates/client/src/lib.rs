//! plauder-client – Client-Seite des Plauder-Chats
//!
//! - [`NachrichtenListe`]: optimistische Nachrichten, Abgleich mit dem Server
//! - [`ChatClient`]: Anfragen mit Quittung und Timeout ueber einen [`Transport`]
//! - [`AnrufSteuerung`]: Anruf-Lebenszyklus ueber abstrakte Medien/Peer-Traits
//!
//! ```no_run
//! use plauder_client::{ChatClient, ClientConfig, WsTransport};
//! use plauder_core::types::UserId;
//!
//! # async fn beispiel() -> plauder_client::ClientResult<()> {
//! let ich = UserId::new();
//! let transport = WsTransport::verbinden("ws://localhost:3001/ws", ich).await?;
//! let mut client = ChatClient::neu(transport, ich, ClientConfig::default());
//! client.nachricht_senden(UserId::new(), "Hallo").await?;
//! # Ok(())
//! # }
//! ```

pub mod anruf;
pub mod client;
pub mod error;
pub mod nachrichten;
pub mod transport;

pub use anruf::{AnrufSteuerung, AnrufZustand, IceZustand, MedienQuelle, PeerFabrik, PeerVerbindung};
pub use client::{ChatClient, ClientConfig};
pub use error::{ClientError, ClientResult};
pub use nachrichten::{LokaleNachricht, NachrichtenListe, NachrichtenZiel, Uebernahme, ZustellStatus};
pub use transport::{Transport, WsTransport};
