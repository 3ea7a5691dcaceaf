//! Fehlertypen fuer das Chat-Crate

use plauder_core::types::RoomId;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RoomId),

    #[error("Datenbank-Fehler: {0}")]
    Datenbank(#[from] plauder_db::DbError),
}

pub type ChatResult<T> = Result<T, ChatError>;
