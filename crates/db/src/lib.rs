//! plauder-db – Persistenz-Adapter fuer den Echtzeit-Kern
//!
//! Der Signaling-Router besitzt keinen Speicher. Er konsumiert drei
//! Faehigkeiten ueber Repository-Traits:
//!
//! - `MessageRepository` – Nachrichten speichern, Verlauf lesen
//! - `CallRepository`    – Anrufe anlegen, Endstatus schreiben
//! - `RoomRepository`    – 1:1-Raum fuer ein Benutzerpaar finden oder anlegen
//!
//! `SqliteDb` implementiert alle drei.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    CallRepository, DatabaseConfig, DbResult, MessageRepository, RoomRepository,
};
pub use sqlite::SqliteDb;
