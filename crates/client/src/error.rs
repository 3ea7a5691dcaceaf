//! Fehlertypen fuer plauder-client

use plauder_protocol::ErrorCode;
use thiserror::Error;

/// Ergebnis-Typ fuer Client-Operationen
pub type ClientResult<T> = Result<T, ClientError>;

/// Fehler auf Client-Seite
#[derive(Debug, Error)]
pub enum ClientError {
    /// Verbindung zum Server gestoert oder geschlossen
    #[error("Transport-Fehler: {0}")]
    Transport(String),

    /// Server hat die Anfrage mit einer Fehler-Quittung abgelehnt
    #[error("Server-Fehler ({code:?}): {message}")]
    Server { code: ErrorCode, message: String },

    /// Keine Quittung innerhalb des Ack-Timeouts
    #[error("Keine Quittung fuer Request {0} erhalten")]
    Zeitueberschreitung(u32),

    #[error("Unerwartete Antwort: {0}")]
    UnerwarteteAntwort(String),

    /// Lokaler Eintrag oder Anruf existiert nicht
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Operation passt nicht zum aktuellen Zustand
    #[error("Ungueltiger Zustand: {0}")]
    UngueltigerZustand(String),

    /// Kamera/Mikrofon oder Peer-Verbindung fehlgeschlagen
    #[error("Medien-Fehler: {0}")]
    Medien(String),
}

impl ClientError {
    /// Fehler-Code der Server-Quittung, falls vorhanden
    pub fn server_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}
