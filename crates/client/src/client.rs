//! Chat-Client – Anfragen mit Quittung und optimistische Nachrichten
//!
//! Jede Anfrage bekommt eine eigene `request_id`. Waehrend auf die
//! Quittung gewartet wird, ankommende Pushes werden nicht verworfen:
//! Nachrichten landen sofort in der Liste, alle Events zusaetzlich in
//! einer Queue fuer [`ChatClient::naechstes_ereignis`].

use chrono::{DateTime, Utc};
use plauder_core::types::{RoomId, UserId};
use plauder_protocol::events::{
    ChatHistoryRequest, MessageEvent, MessageInfo, Quittung, RoomRequest, SendMessageRequest,
    SendRoomMessageRequest,
};
use plauder_protocol::{ClientEvent, ClientFrame, LeereAnfrage, ServerEvent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::nachrichten::{NachrichtenListe, NachrichtenZiel};
use crate::transport::Transport;

/// Client-Konfiguration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wartezeit auf eine Quittung in Sekunden
    pub ack_timeout_sek: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { ack_timeout_sek: 10 }
    }
}

impl ClientConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_sek)
    }
}

pub struct ChatClient<T: Transport> {
    transport: T,
    user_id: UserId,
    config: ClientConfig,
    naechste_request_id: u32,
    nachrichten: NachrichtenListe,
    /// Pushes die noch nicht abgeholt wurden
    ereignisse: VecDeque<ServerEvent>,
}

impl<T: Transport> ChatClient<T> {
    pub fn neu(transport: T, user_id: UserId, config: ClientConfig) -> Self {
        Self {
            transport,
            user_id,
            config,
            naechste_request_id: 1,
            nachrichten: NachrichtenListe::neu(),
            ereignisse: VecDeque::new(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn nachrichten(&self) -> &NachrichtenListe {
        &self.nachrichten
    }

    pub fn nachrichten_mut(&mut self) -> &mut NachrichtenListe {
        &mut self.nachrichten
    }

    // -----------------------------------------------------------------------
    // Nachrichten
    // -----------------------------------------------------------------------

    /// Legt die ausstehende Nachricht an, ohne etwas zu senden
    pub fn nachricht_vorbereiten(
        &mut self,
        ziel: NachrichtenZiel,
        text: impl Into<String>,
        attachment: Option<String>,
    ) -> String {
        self.nachrichten
            .ausstehend_einfuegen(self.user_id, ziel, text, attachment)
    }

    /// Sendet einen vorbereiteten Eintrag und wartet auf die Quittung
    ///
    /// Fehler-Quittung, Timeout oder Transportfehler markieren den Eintrag
    /// als fehlgeschlagen. Eine trotzdem gespeicherte Nachricht kommt dann
    /// spaeter als eigener Eintrag an.
    pub async fn nachricht_abschicken(&mut self, temp_id: &str) -> ClientResult<MessageInfo> {
        let eintrag = self
            .nachrichten
            .per_temp_id(temp_id)
            .cloned()
            .ok_or_else(|| ClientError::NichtGefunden(temp_id.to_string()))?;

        let event = match eintrag.ziel {
            NachrichtenZiel::Privat(empfaenger) => ClientEvent::SendMessage(SendMessageRequest {
                sender_id: self.user_id,
                receiver_id: empfaenger,
                text: eintrag.text,
                chat_room_id: eintrag.room_id,
                attachment: eintrag.attachment,
                client_message_id: Some(temp_id.to_string()),
            }),
            NachrichtenZiel::Raum(room_id) => ClientEvent::SendRoomMessage(SendRoomMessageRequest {
                sender_id: self.user_id,
                room_id,
                text: eintrag.text,
                attachment: eintrag.attachment,
                client_message_id: Some(temp_id.to_string()),
            }),
        };

        match self.anfrage::<MessageEvent>(event).await {
            Ok(bestaetigt) => {
                self.nachrichten.uebernehmen(&bestaetigt.message, Some(temp_id));
                Ok(bestaetigt.message)
            }
            Err(e) => {
                self.nachrichten.fehlgeschlagen(temp_id);
                tracing::warn!(temp_id, fehler = %e, "Nachricht fehlgeschlagen");
                Err(e)
            }
        }
    }

    pub async fn nachricht_senden(
        &mut self,
        empfaenger: UserId,
        text: impl Into<String>,
    ) -> ClientResult<MessageInfo> {
        let temp_id = self.nachricht_vorbereiten(NachrichtenZiel::Privat(empfaenger), text, None);
        self.nachricht_abschicken(&temp_id).await
    }

    pub async fn raum_nachricht_senden(
        &mut self,
        room_id: RoomId,
        text: impl Into<String>,
    ) -> ClientResult<MessageInfo> {
        let temp_id = self.nachricht_vorbereiten(NachrichtenZiel::Raum(room_id), text, None);
        self.nachricht_abschicken(&temp_id).await
    }

    /// Manueller neuer Versuch fuer einen fehlgeschlagenen Eintrag
    pub async fn erneut_senden(&mut self, temp_id: &str) -> ClientResult<MessageInfo> {
        self.nachrichten.erneut_senden(temp_id)?;
        self.nachricht_abschicken(temp_id).await
    }

    /// Laedt Verlauf und fuehrt ihn in die Liste ein; gibt neue Eintraege zurueck
    pub async fn verlauf_laden(
        &mut self,
        room_id: RoomId,
        before: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> ClientResult<usize> {
        let verlauf: Vec<MessageInfo> = self
            .anfrage(ClientEvent::GetChatHistory(ChatHistoryRequest {
                room_id,
                before,
                limit,
            }))
            .await?;
        Ok(self.nachrichten.verlauf_uebernehmen(verlauf))
    }

    // -----------------------------------------------------------------------
    // Raeume und Presence
    // -----------------------------------------------------------------------

    pub async fn raum_beitreten(&mut self, room_id: RoomId) -> ClientResult<()> {
        self.anfrage::<RoomRequest>(ClientEvent::JoinRoom(RoomRequest { room_id }))
            .await
            .map(|_| ())
    }

    pub async fn raum_verlassen(&mut self, room_id: RoomId) -> ClientResult<()> {
        self.anfrage::<RoomRequest>(ClientEvent::LeaveRoom(RoomRequest { room_id }))
            .await
            .map(|_| ())
    }

    pub async fn online_benutzer(&mut self) -> ClientResult<Vec<UserId>> {
        self.anfrage(ClientEvent::GetOnlineUsers(LeereAnfrage)).await
    }

    // -----------------------------------------------------------------------
    // Allgemein
    // -----------------------------------------------------------------------

    /// Sendet ein Event und wartet auf die zugehoerige Quittung
    pub async fn anfrage<D: DeserializeOwned>(&mut self, event: ClientEvent) -> ClientResult<D> {
        let request_id = self.naechste_id();
        self.transport
            .senden(&ClientFrame::antwort(request_id, event))
            .await?;

        let wartezeit = self.config.ack_timeout();
        let quittung = tokio::time::timeout(wartezeit, self.auf_quittung_warten(request_id))
            .await
            .map_err(|_| ClientError::Zeitueberschreitung(request_id))??;

        if let Some(fehler) = quittung.error {
            return Err(ClientError::Server {
                code: fehler.code,
                message: fehler.message,
            });
        }
        if !quittung.success {
            return Err(ClientError::UnerwarteteAntwort(
                "Quittung ohne Erfolg und ohne Fehler".into(),
            ));
        }

        let daten = quittung.data.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(daten).map_err(|e| ClientError::UnerwarteteAntwort(e.to_string()))
    }

    /// Sendet ein Event ohne auf eine Quittung zu warten
    pub async fn ereignis_senden(&mut self, event: ClientEvent) -> ClientResult<()> {
        self.transport.senden(&ClientFrame::push(event)).await
    }

    /// Naechster Push vom Server; Nachrichten stehen dann schon in der Liste
    pub async fn naechstes_ereignis(&mut self) -> ClientResult<Option<ServerEvent>> {
        if let Some(event) = self.ereignisse.pop_front() {
            return Ok(Some(event));
        }
        loop {
            let Some(frame) = self.transport.empfangen().await? else {
                return Ok(None);
            };
            if let ServerEvent::Ack(_) = frame.event {
                tracing::debug!(request_id = ?frame.request_id, "Verspaetete Quittung verworfen");
                continue;
            }
            self.push_verarbeiten(frame.event);
            return Ok(self.ereignisse.pop_front());
        }
    }

    async fn auf_quittung_warten(&mut self, request_id: u32) -> ClientResult<Quittung> {
        loop {
            let frame = self
                .transport
                .empfangen()
                .await?
                .ok_or_else(|| ClientError::Transport("Verbindung geschlossen".into()))?;

            match frame.event {
                ServerEvent::Ack(quittung) if frame.request_id == Some(request_id) => {
                    return Ok(quittung)
                }
                ServerEvent::Ack(_) => {
                    tracing::debug!(request_id = ?frame.request_id, "Verspaetete Quittung verworfen");
                }
                event => self.push_verarbeiten(event),
            }
        }
    }

    fn push_verarbeiten(&mut self, event: ServerEvent) {
        if let ServerEvent::PrivateMessage(m) | ServerEvent::RoomMessage(m) = &event {
            self.nachrichten
                .uebernehmen(&m.message, m.client_message_id.as_deref());
        }
        self.ereignisse.push_back(event);
    }

    fn naechste_id(&mut self) -> u32 {
        let id = self.naechste_request_id;
        self.naechste_request_id = self.naechste_request_id.checked_add(1).unwrap_or(1);
        id
    }
}
