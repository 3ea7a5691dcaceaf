//! plauder-chat – Nachrichten-Persistenz fuer den Signaling-Router
//!
//! Der `ChatService` ist die einzige Stelle an der Nachrichten gespeichert
//! werden. Er prueft Inhalte, loest 1:1-Raeume auf und liest den Verlauf.
//! Verteilt wird erst im Router, nachdem der Service erfolgreich war.
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use plauder_chat::ChatService;
//! use plauder_core::UserId;
//! use plauder_db::SqliteDb;
//!
//! # async fn beispiel() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(SqliteDb::in_memory().await?);
//! let chat = ChatService::neu(db);
//! let nachricht = chat
//!     .private_nachricht_senden(UserId::new(), UserId::new(), "hi", None, None)
//!     .await?;
//! println!("{}", nachricht.id);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod service;
pub mod types;

pub use error::{ChatError, ChatResult};
pub use service::{ChatService, MAX_ANHANG_LAENGE, MAX_NACHRICHT_LAENGE};
pub use types::{ChatNachricht, HistoryAnfrage, VerlaufLimits};
