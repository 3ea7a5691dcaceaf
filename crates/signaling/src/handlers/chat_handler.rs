//! Chat-Handler – Nachrichten senden und Verlauf laden
//!
//! Ablauf fuer jede Nachricht: Absender pruefen, ueber den ChatService
//! speichern, erst danach an die Ziel-Verbindungen verteilen. Schlaegt das
//! Speichern fehl, wird nichts verteilt.

use plauder_chat::{ChatNachricht, HistoryAnfrage};
use plauder_protocol::events::{
    ChatHistoryRequest, MessageEvent, MessageInfo, SendMessageRequest, SendRoomMessageRequest,
};
use plauder_protocol::ServerEvent;

use crate::dispatcher::VerbindungsKontext;
use crate::error::SignalingResult;
use crate::handlers::absender_pruefen;
use crate::server_state::{SignalingState, Speicher};

/// Wandelt eine gespeicherte Nachricht in das Draht-Format
pub fn message_info(n: ChatNachricht) -> MessageInfo {
    MessageInfo {
        id: n.id,
        sender_id: n.sender_id,
        receiver_id: n.receiver_id,
        chat_room_id: n.room_id,
        text: n.text,
        attachment: n.attachment,
        created_at: n.created_at,
    }
}

/// `sendMessage` – private Nachricht
///
/// Zustellung an alle Verbindungen von Absender und Empfaenger. Ist der
/// Empfaenger offline, bekommt er die Nachricht erst ueber den Verlauf.
/// Keine Idempotenz: gleiche Anfragen erzeugen mehrere Nachrichten.
pub async fn send_message<R: Speicher>(
    req: SendMessageRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<MessageEvent> {
    absender_pruefen(req.sender_id, ctx, "senderId")?;

    let nachricht = state
        .chat_service
        .private_nachricht_senden(
            req.sender_id,
            req.receiver_id,
            &req.text,
            req.chat_room_id,
            req.attachment.as_deref(),
        )
        .await?;

    let event = MessageEvent {
        success: true,
        message: message_info(nachricht),
        client_message_id: req.client_message_id,
    };

    let ziele = state
        .presence
        .verbindungen_von(&req.sender_id)
        .into_iter()
        .chain(state.presence.verbindungen_von(&req.receiver_id));
    let zugestellt = state
        .broadcaster
        .deliver(ServerEvent::PrivateMessage(event.clone()), ziele);

    tracing::info!(
        user_id = %ctx.user_id,
        receiver_id = %req.receiver_id,
        message_id = %event.message.id,
        room_id = %event.message.chat_room_id,
        zugestellt,
        "Private Nachricht"
    );
    Ok(event)
}

/// `sendRoomMessage` – Nachricht in einen bestehenden Raum
///
/// Auch ohne Beitritt erlaubt; der Absender bekommt die Nachricht dann
/// ueber seine eigenen Verbindungen zurueck.
pub async fn send_room_message<R: Speicher>(
    req: SendRoomMessageRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<MessageEvent> {
    absender_pruefen(req.sender_id, ctx, "senderId")?;

    let nachricht = state
        .chat_service
        .raum_nachricht_senden(
            req.sender_id,
            req.room_id,
            &req.text,
            req.attachment.as_deref(),
        )
        .await?;

    let event = MessageEvent {
        success: true,
        message: message_info(nachricht),
        client_message_id: req.client_message_id,
    };

    let ziele = state
        .broadcaster
        .verbindungen_in_raum(&req.room_id)
        .into_iter()
        .chain(state.presence.verbindungen_von(&req.sender_id));
    let zugestellt = state
        .broadcaster
        .deliver(ServerEvent::RoomMessage(event.clone()), ziele);

    tracing::info!(
        user_id = %ctx.user_id,
        room_id = %req.room_id,
        message_id = %event.message.id,
        zugestellt,
        "Raum-Nachricht"
    );
    Ok(event)
}

/// `getChatHistory` – reiner Lesezugriff
pub async fn get_chat_history<R: Speicher>(
    req: ChatHistoryRequest,
    state: &SignalingState<R>,
) -> SignalingResult<Vec<MessageInfo>> {
    let verlauf = state
        .chat_service
        .verlauf_laden(HistoryAnfrage {
            room_id: req.room_id,
            before: req.before,
            limit: req.limit,
        })
        .await?;

    Ok(verlauf.into_iter().map(message_info).collect())
}
