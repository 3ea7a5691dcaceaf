//! Message-Dispatcher – Routet Client-Events an die Handler
//!
//! Der Dispatcher dekodiert Text-Frames, ruft den passenden Handler auf
//! und baut aus dessen Ergebnis die Quittung (`ack`). Frames ohne
//! `request_id` bekommen keine Quittung; Fehler werden dann nur geloggt.

use plauder_core::types::{ConnectionId, UserId};
use plauder_protocol::{ClientEvent, ClientFrame, ErrorCode, ServerEvent, ServerFrame};
use plauder_protocol::events::Quittung;
use serde::Serialize;
use std::sync::Arc;

use crate::error::SignalingResult;
use crate::handlers::{call_handler, chat_handler, presence_handler, room_handler};
use crate::server_state::{SignalingState, Speicher};

/// Kontext der Verbindung, von der ein Event stammt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbindungsKontext {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher<R: Speicher> {
    state: Arc<SignalingState<R>>,
}

impl<R: Speicher> Clone for MessageDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R: Speicher> MessageDispatcher<R> {
    pub fn neu(state: Arc<SignalingState<R>>) -> Self {
        Self { state }
    }

    /// Dekodiert einen Text-Frame und verarbeitet ihn
    ///
    /// Nicht dekodierbare Frames werden mit `InvalidArgument` quittiert,
    /// sofern eine `request_id` lesbar war.
    pub async fn text_verarbeiten(
        &self,
        text: &str,
        ctx: &VerbindungsKontext,
    ) -> Option<ServerFrame> {
        match ClientFrame::from_json(text, self.state.config.max_frame_groesse) {
            Ok(frame) => self.dispatch(frame, ctx).await,
            Err(e) => {
                tracing::warn!(
                    connection_id = %ctx.connection_id,
                    fehler = %e,
                    "Ungueltiger Frame"
                );
                e.request_id().map(|id| {
                    ServerFrame::antwort(
                        id,
                        ServerEvent::Ack(Quittung::fehler(ErrorCode::InvalidArgument, e.to_string())),
                    )
                })
            }
        }
    }

    /// Verarbeitet ein Event und gibt ggf. die Quittung zurueck
    pub async fn dispatch(
        &self,
        frame: ClientFrame,
        ctx: &VerbindungsKontext,
    ) -> Option<ServerFrame> {
        let event_name = frame.event.name();
        let state = self.state.as_ref();

        let quittung = match frame.event {
            // -------------------------------------------------------------------
            // Chat
            // -------------------------------------------------------------------
            ClientEvent::SendMessage(req) => {
                quittung(chat_handler::send_message(req, ctx, state).await)
            }
            ClientEvent::SendRoomMessage(req) => {
                quittung(chat_handler::send_room_message(req, ctx, state).await)
            }
            ClientEvent::GetChatHistory(req) => {
                quittung(chat_handler::get_chat_history(req, state).await)
            }

            // -------------------------------------------------------------------
            // Raeume und Presence
            // -------------------------------------------------------------------
            ClientEvent::JoinRoom(req) => quittung(room_handler::join_room(req, ctx, state)),
            ClientEvent::LeaveRoom(req) => quittung(room_handler::leave_room(req, ctx, state)),
            ClientEvent::GetOnlineUsers(_) => {
                quittung(presence_handler::get_online_users(ctx, state))
            }

            // -------------------------------------------------------------------
            // Anrufe
            // -------------------------------------------------------------------
            ClientEvent::StartCall(req) => {
                quittung(call_handler::start_call(req, ctx, state).await)
            }
            ClientEvent::AnswerCall(req) => {
                quittung(call_handler::answer_call(req, ctx, state).await)
            }
            ClientEvent::IceCandidate(req) => {
                quittung(call_handler::ice_candidate(req, ctx, state))
            }
            ClientEvent::EndCall(req) => quittung(call_handler::end_call(req, ctx, state).await),
            ClientEvent::DeclineCall(req) => {
                quittung(call_handler::decline_call(req, ctx, state).await)
            }
            ClientEvent::GetCallHistory(_) => {
                quittung(call_handler::get_call_history(ctx, state).await)
            }
        };

        if let Some(fehler) = &quittung.error {
            tracing::debug!(
                connection_id = %ctx.connection_id,
                user_id = %ctx.user_id,
                event = event_name,
                code = ?fehler.code,
                fehler = %fehler.message,
                "Event abgelehnt"
            );
        }

        frame
            .request_id
            .map(|id| ServerFrame::antwort(id, ServerEvent::Ack(quittung)))
    }
}

/// Baut aus einem Handler-Ergebnis die Quittung
fn quittung<T: Serialize>(ergebnis: SignalingResult<T>) -> Quittung {
    match ergebnis {
        Ok(daten) => Quittung::ok(daten),
        Err(e) => Quittung::fehler(e.error_code(), e.to_string()),
    }
}
