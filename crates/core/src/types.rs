//! Gemeinsame Identifikationstypen fuer Plauder
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Auf dem Draht
//! werden sie als nackte UUID-Strings serialisiert.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_typ {
    ($(#[$meta:meta])* $name:ident, $praefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Erstellt eine neue zufaellige ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Gibt die innere UUID zurueck
            pub fn inner(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($praefix, ":{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

id_typ!(
    /// Eindeutige Benutzer-ID
    UserId,
    "user"
);
id_typ!(
    /// ID eines Chat-Raums (1:1 oder Gruppe)
    RoomId,
    "room"
);
id_typ!(
    /// Server-vergebene ID einer persistierten Nachricht
    MessageId,
    "msg"
);
id_typ!(
    /// ID einer Anruf-Session
    CallId,
    "call"
);
id_typ!(
    /// ID einer einzelnen Echtzeit-Verbindung (ein Socket, ein Tab, ein Geraet)
    ConnectionId,
    "conn"
);

// ---------------------------------------------------------------------------
// Anruf-Enums
// ---------------------------------------------------------------------------

/// Art des Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnrufTyp {
    Audio,
    Video,
}

impl AnrufTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl FromStr for AnrufTyp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            andere => Err(format!("Unbekannter Anruftyp: {andere}")),
        }
    }
}

/// Status einer Anruf-Session
///
/// `Ongoing` ist der einzige nicht-terminale Zustand. Aus einem terminalen
/// Zustand fuehrt kein Uebergang heraus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnrufStatus {
    Ongoing,
    Missed,
    Completed,
    Declined,
}

/// Status-String der keiner der drei terminalen Zustaende ist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ungueltiger Endstatus '{0}' (erlaubt: missed, completed, declined)")]
pub struct UngueltigerAnrufStatus(pub String);

impl AnrufStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Missed => "missed",
            Self::Completed => "completed",
            Self::Declined => "declined",
        }
    }

    pub fn ist_terminal(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }

    /// Parst einen Endstatus; `ongoing` und alles Unbekannte wird abgelehnt
    pub fn terminal_aus_str(s: &str) -> Result<Self, UngueltigerAnrufStatus> {
        match s {
            "missed" => Ok(Self::Missed),
            "completed" => Ok(Self::Completed),
            "declined" => Ok(Self::Declined),
            andere => Err(UngueltigerAnrufStatus(andere.to_string())),
        }
    }
}

impl FromStr for AnrufStatus {
    type Err = UngueltigerAnrufStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(Self::Ongoing),
            andere => Self::terminal_aus_str(andere),
        }
    }
}
