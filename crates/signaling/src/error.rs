//! Fehlertypen fuer den Signaling-Service

use plauder_chat::ChatError;
use plauder_core::types::{CallId, UserId};
use plauder_db::DbError;
use plauder_protocol::ErrorCode;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
///
/// Jede Variante entspricht genau einem Fehler-Code auf dem Draht.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Fehlendes oder fehlerhaftes Pflichtfeld
    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    /// Anruf/Raum existiert nicht oder ist bereits beendet
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Speicher-Aufruf fehlgeschlagen, nichts wurde verteilt
    #[error("Persistenz fehlgeschlagen: {0}")]
    Persistenz(String),

    /// Ziel-Benutzer hat keine aktive Verbindung
    #[error("Benutzer {0} ist nicht erreichbar")]
    PeerNichtErreichbar(UserId),

    /// Fuer das Benutzerpaar laeuft bereits ein Anruf
    #[error("Zwischen diesen Benutzern laeuft bereits Anruf {0}")]
    AnrufBesetzt(CallId),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigesArgument(msg.into())
    }

    pub fn anruf_nicht_gefunden(call_id: CallId) -> Self {
        Self::NichtGefunden(format!("Anruf {call_id} existiert nicht oder ist beendet"))
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fehler-Code fuer die Quittung
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UngueltigesArgument(_) => ErrorCode::InvalidArgument,
            Self::NichtGefunden(_) => ErrorCode::NotFound,
            Self::Persistenz(_) => ErrorCode::PersistenceFailure,
            Self::PeerNichtErreichbar(_) => ErrorCode::PeerUnavailable,
            Self::AnrufBesetzt(_) => ErrorCode::CallBusy,
            Self::Intern(_) => ErrorCode::InternalError,
        }
    }
}

impl From<DbError> for SignalingError {
    fn from(e: DbError) -> Self {
        Self::Persistenz(e.to_string())
    }
}

impl From<ChatError> for SignalingError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::UngueltigeEingabe(msg) => Self::UngueltigesArgument(msg),
            ChatError::RaumNichtGefunden(raum) => {
                Self::NichtGefunden(format!("Raum {raum} existiert nicht"))
            }
            ChatError::Datenbank(db) => Self::from(db),
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use plauder_core::types::RoomId;

    #[test]
    fn chat_fehler_werden_abgebildet() {
        let e: SignalingError = ChatError::UngueltigeEingabe("leer".into()).into();
        assert_eq!(e.error_code(), ErrorCode::InvalidArgument);

        let e: SignalingError = ChatError::RaumNichtGefunden(RoomId::new()).into();
        assert_eq!(e.error_code(), ErrorCode::NotFound);

        let e: SignalingError = ChatError::Datenbank(DbError::intern("weg")).into();
        assert_eq!(e.error_code(), ErrorCode::PersistenceFailure);
    }

    #[test]
    fn db_fehler_ist_persistenz() {
        let e: SignalingError = DbError::nicht_gefunden("Anruf").into();
        assert_eq!(e.error_code(), ErrorCode::PersistenceFailure);
    }

    #[test]
    fn besetzt_hat_eigenen_code() {
        let e = SignalingError::AnrufBesetzt(CallId::new());
        assert_eq!(e.error_code(), ErrorCode::CallBusy);
    }
}
