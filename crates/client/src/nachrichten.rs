//! Optimistische Nachrichtenliste
//!
//! Eine Sende-Absicht landet sofort als `Ausstehend` in der Liste, noch
//! bevor irgendetwas ueber das Netz geht. Die Bestaetigung des Servers
//! ersetzt den Eintrag an derselben Stelle. Zugeordnet wird ueber die
//! temporaere ID (`clientMessageId`); nur wenn der Server keine mitschickt,
//! greift der Vergleich von Absender und Text.

use chrono::{DateTime, Utc};
use plauder_core::types::{MessageId, RoomId, UserId};
use plauder_protocol::events::MessageInfo;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Lokaler Zustellstatus (wird nicht gespeichert)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZustellStatus {
    Ausstehend,
    Zugestellt,
    Gelesen,
    Fehlgeschlagen,
}

/// Empfaenger einer Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NachrichtenZiel {
    Privat(UserId),
    Raum(RoomId),
}

/// Ein Eintrag der lokalen Liste
#[derive(Debug, Clone, PartialEq)]
pub struct LokaleNachricht {
    /// Nur bei lokal erzeugten Eintraegen gesetzt
    pub temp_id: Option<String>,
    /// Server-ID, sobald bestaetigt
    pub id: Option<MessageId>,
    pub sender_id: UserId,
    pub ziel: NachrichtenZiel,
    pub room_id: Option<RoomId>,
    pub text: String,
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: ZustellStatus,
}

impl LokaleNachricht {
    fn aus_server(info: &MessageInfo) -> Self {
        let ziel = match info.receiver_id {
            Some(empfaenger) => NachrichtenZiel::Privat(empfaenger),
            None => NachrichtenZiel::Raum(info.chat_room_id),
        };
        Self {
            temp_id: None,
            id: Some(info.id),
            sender_id: info.sender_id,
            ziel,
            room_id: Some(info.chat_room_id),
            text: info.text.clone(),
            attachment: info.attachment.clone(),
            created_at: info.created_at,
            status: ZustellStatus::Zugestellt,
        }
    }

    fn bestaetigen(&mut self, info: &MessageInfo) {
        self.id = Some(info.id);
        self.room_id = Some(info.chat_room_id);
        self.text = info.text.clone();
        self.attachment = info.attachment.clone();
        self.created_at = info.created_at;
        self.status = ZustellStatus::Zugestellt;
    }
}

/// Was beim Uebernehmen einer Server-Nachricht passiert ist (mit Index)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uebernahme {
    /// Ausstehender Eintrag wurde an Ort und Stelle ersetzt
    Ersetzt(usize),
    /// Neue Nachricht chronologisch eingefuegt
    Angehaengt(usize),
    /// Server-ID war schon bekannt, nichts geaendert
    Bekannt(usize),
}

/// Geordnete Nachrichtenliste eines Chats
#[derive(Debug, Default)]
pub struct NachrichtenListe {
    eintraege: Vec<LokaleNachricht>,
}

impl NachrichtenListe {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt eine ausstehende Nachricht ein und gibt ihre temporaere ID zurueck
    pub fn ausstehend_einfuegen(
        &mut self,
        sender_id: UserId,
        ziel: NachrichtenZiel,
        text: impl Into<String>,
        attachment: Option<String>,
    ) -> String {
        let temp_id = format!("tmp-{}", Uuid::new_v4());
        let room_id = match ziel {
            NachrichtenZiel::Raum(raum) => Some(raum),
            NachrichtenZiel::Privat(_) => None,
        };
        self.eintraege.push(LokaleNachricht {
            temp_id: Some(temp_id.clone()),
            id: None,
            sender_id,
            ziel,
            room_id,
            text: text.into(),
            attachment,
            created_at: Utc::now(),
            status: ZustellStatus::Ausstehend,
        });
        temp_id
    }

    /// Uebernimmt eine bestaetigte Nachricht (Quittung oder Broadcast)
    pub fn uebernehmen(&mut self, info: &MessageInfo, client_message_id: Option<&str>) -> Uebernahme {
        if let Some(pos) = self.position_von_id(&info.id) {
            return Uebernahme::Bekannt(pos);
        }

        let treffer = match client_message_id {
            Some(temp) => self.eintraege.iter().position(|n| {
                n.status == ZustellStatus::Ausstehend && n.temp_id.as_deref() == Some(temp)
            }),
            None => self.eintraege.iter().position(|n| {
                n.status == ZustellStatus::Ausstehend
                    && n.id.is_none()
                    && n.sender_id == info.sender_id
                    && n.text == info.text
            }),
        };

        match treffer {
            Some(pos) => {
                self.eintraege[pos].bestaetigen(info);
                Uebernahme::Ersetzt(pos)
            }
            None => Uebernahme::Angehaengt(self.chronologisch_einfuegen(LokaleNachricht::aus_server(info))),
        }
    }

    /// Markiert einen noch ausstehenden Eintrag als fehlgeschlagen
    ///
    /// Bereits bestaetigte Eintraege bleiben unveraendert.
    pub fn fehlgeschlagen(&mut self, temp_id: &str) -> bool {
        match self.per_temp_id_mut(temp_id) {
            Some(n) if n.status == ZustellStatus::Ausstehend => {
                n.status = ZustellStatus::Fehlgeschlagen;
                true
            }
            _ => false,
        }
    }

    /// Setzt einen fehlgeschlagenen Eintrag fuer einen erneuten Versuch zurueck
    pub fn erneut_senden(&mut self, temp_id: &str) -> ClientResult<LokaleNachricht> {
        let eintrag = self
            .per_temp_id_mut(temp_id)
            .ok_or_else(|| ClientError::NichtGefunden(temp_id.to_string()))?;

        if eintrag.status != ZustellStatus::Fehlgeschlagen {
            return Err(ClientError::UngueltigerZustand(format!(
                "{temp_id} ist nicht fehlgeschlagen ({:?})",
                eintrag.status
            )));
        }
        eintrag.status = ZustellStatus::Ausstehend;
        Ok(eintrag.clone())
    }

    pub fn als_gelesen_markieren(&mut self, id: &MessageId) -> bool {
        match self.position_von_id(id) {
            Some(pos) if self.eintraege[pos].status == ZustellStatus::Zugestellt => {
                self.eintraege[pos].status = ZustellStatus::Gelesen;
                true
            }
            _ => false,
        }
    }

    /// Fuehrt geladenen Verlauf ein; bekannte Server-IDs werden uebersprungen
    pub fn verlauf_uebernehmen(&mut self, nachrichten: impl IntoIterator<Item = MessageInfo>) -> usize {
        let mut neu = 0;
        for info in nachrichten {
            if self.position_von_id(&info.id).is_none() {
                self.chronologisch_einfuegen(LokaleNachricht::aus_server(&info));
                neu += 1;
            }
        }
        neu
    }

    pub fn eintraege(&self) -> &[LokaleNachricht] {
        &self.eintraege
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    pub fn per_temp_id(&self, temp_id: &str) -> Option<&LokaleNachricht> {
        self.eintraege
            .iter()
            .find(|n| n.temp_id.as_deref() == Some(temp_id))
    }

    pub fn per_id(&self, id: &MessageId) -> Option<&LokaleNachricht> {
        self.position_von_id(id).map(|pos| &self.eintraege[pos])
    }

    fn per_temp_id_mut(&mut self, temp_id: &str) -> Option<&mut LokaleNachricht> {
        self.eintraege
            .iter_mut()
            .find(|n| n.temp_id.as_deref() == Some(temp_id))
    }

    fn position_von_id(&self, id: &MessageId) -> Option<usize> {
        self.eintraege.iter().position(|n| n.id.as_ref() == Some(id))
    }

    /// Hinter dem letzten Eintrag der nicht juenger ist
    fn chronologisch_einfuegen(&mut self, nachricht: LokaleNachricht) -> usize {
        let pos = self
            .eintraege
            .iter()
            .rposition(|n| n.created_at <= nachricht.created_at)
            .map_or(0, |i| i + 1);
        self.eintraege.insert(pos, nachricht);
        pos
    }
}
