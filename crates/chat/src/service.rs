//! ChatService – Nachrichten pruefen, speichern, Verlauf laden

use std::sync::Arc;

use plauder_core::types::{RoomId, UserId};
use plauder_db::{
    models::{NachrichtenFilter, NeueNachricht, RaumTyp},
    MessageRepository, RoomRepository,
};
use tracing::debug;

use crate::{
    error::{ChatError, ChatResult},
    types::{ChatNachricht, HistoryAnfrage, VerlaufLimits},
};

/// Maximale Laenge eines Nachrichtentexts in Bytes
pub const MAX_NACHRICHT_LAENGE: usize = 4096;

/// Maximale Laenge einer Anhang-Referenz (URL o.ae.)
pub const MAX_ANHANG_LAENGE: usize = 2048;

/// ChatService speichert Nachrichten ueber die Repository-Traits
pub struct ChatService<R: MessageRepository + RoomRepository> {
    repo: Arc<R>,
    limits: VerlaufLimits,
}

impl<R: MessageRepository + RoomRepository> ChatService<R> {
    /// Erstellt einen neuen ChatService mit Standard-Limits
    pub fn neu(repo: Arc<R>) -> Arc<Self> {
        Self::mit_limits(repo, VerlaufLimits::default())
    }

    pub fn mit_limits(repo: Arc<R>, limits: VerlaufLimits) -> Arc<Self> {
        Arc::new(Self { repo, limits })
    }

    /// Private Nachricht senden
    ///
    /// Der 1:1-Raum des Paares wird aufgeloest oder angelegt. Ein vom Client
    /// mitgeschickter Raum muss genau dieser Raum sein.
    pub async fn private_nachricht_senden(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        text: &str,
        chat_room_id: Option<RoomId>,
        attachment: Option<&str>,
    ) -> ChatResult<ChatNachricht> {
        inhalt_pruefen(text, attachment)?;

        let raum = self
            .repo
            .find_or_create_private_room(sender_id, receiver_id)
            .await?;

        if let Some(angegeben) = chat_room_id {
            if angegeben != raum.id {
                return Err(ChatError::UngueltigeEingabe(format!(
                    "Raum {angegeben} gehoert nicht zu diesem Benutzerpaar"
                )));
            }
        }

        let record = self
            .repo
            .save_message(NeueNachricht {
                room_id: raum.id,
                sender_id,
                receiver_id: Some(receiver_id),
                text,
                attachment,
            })
            .await?;

        debug!(message_id = %record.id, room_id = %raum.id, "Private Nachricht gespeichert");
        Ok(record.into())
    }

    /// Nachricht in einen bestehenden Raum senden
    ///
    /// Mitgliedschaft wird nicht geprueft: sie betrifft nur die Zustellung.
    /// Private Raeume werden abgelehnt.
    pub async fn raum_nachricht_senden(
        &self,
        sender_id: UserId,
        room_id: RoomId,
        text: &str,
        attachment: Option<&str>,
    ) -> ChatResult<ChatNachricht> {
        inhalt_pruefen(text, attachment)?;

        let raum = self
            .repo
            .get_room(room_id)
            .await?
            .ok_or(ChatError::RaumNichtGefunden(room_id))?;

        // 1:1-Raeume nur ueber sendMessage, sonst fehlt der Empfaenger
        if raum.typ == RaumTyp::Privat {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Raum {room_id} ist ein privater Raum"
            )));
        }

        let record = self
            .repo
            .save_message(NeueNachricht {
                room_id,
                sender_id,
                receiver_id: None,
                text,
                attachment,
            })
            .await?;

        debug!(message_id = %record.id, room_id = %room_id, "Raum-Nachricht gespeichert");
        Ok(record.into())
    }

    /// Verlauf eines Raums laden (chronologisch, Cursor-Pagination)
    pub async fn verlauf_laden(&self, anfrage: HistoryAnfrage) -> ChatResult<Vec<ChatNachricht>> {
        let records = self
            .repo
            .find_history(NachrichtenFilter {
                room_id: anfrage.room_id,
                before: anfrage.before,
                limit: self.limits.anwenden(anfrage.limit),
            })
            .await?;

        Ok(records.into_iter().map(ChatNachricht::from).collect())
    }
}

fn inhalt_pruefen(text: &str, attachment: Option<&str>) -> ChatResult<()> {
    // Reine Anhang-Nachrichten duerfen einen leeren Text haben
    if text.trim().is_empty() && attachment.is_none() {
        return Err(ChatError::UngueltigeEingabe(
            "Nachrichteninhalt darf nicht leer sein".into(),
        ));
    }

    if text.len() > MAX_NACHRICHT_LAENGE {
        return Err(ChatError::UngueltigeEingabe(format!(
            "Nachricht zu lang: {} Zeichen (Maximum: {MAX_NACHRICHT_LAENGE})",
            text.len()
        )));
    }

    if let Some(anhang) = attachment {
        if anhang.trim().is_empty() || anhang.len() > MAX_ANHANG_LAENGE {
            return Err(ChatError::UngueltigeEingabe(
                "Ungueltige Anhang-Referenz".into(),
            ));
        }
    }

    Ok(())
}
