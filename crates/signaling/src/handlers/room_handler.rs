//! Raum-Handler – `joinRoom` / `leaveRoom`
//!
//! Mitgliedschaft betrifft nur die Zustellung von Raum-Nachrichten. Sie
//! wird pro Verbindung gefuehrt, nicht pro Benutzer.

use plauder_protocol::events::{RoomMembershipEvent, RoomRequest};
use plauder_protocol::ServerEvent;

use crate::dispatcher::VerbindungsKontext;
use crate::error::SignalingResult;
use crate::server_state::{SignalingState, Speicher};

pub fn join_room<R: Speicher>(
    req: RoomRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<RoomRequest> {
    if state.broadcaster.raum_beitreten(ctx.connection_id, req.room_id) {
        state.broadcaster.deliver(
            ServerEvent::RoomMembership(RoomMembershipEvent {
                room_id: req.room_id,
                user_id: ctx.user_id,
                joined: true,
            }),
            state.broadcaster.verbindungen_in_raum(&req.room_id),
        );
        tracing::debug!(
            connection_id = %ctx.connection_id,
            room_id = %req.room_id,
            "Raum beigetreten"
        );
    }
    Ok(req)
}

pub fn leave_room<R: Speicher>(
    req: RoomRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<RoomRequest> {
    // Empfaenger inklusive der austretenden Verbindung
    let ziele = state.broadcaster.verbindungen_in_raum(&req.room_id);

    if state.broadcaster.raum_verlassen(&ctx.connection_id, &req.room_id) {
        state.broadcaster.deliver(
            ServerEvent::RoomMembership(RoomMembershipEvent {
                room_id: req.room_id,
                user_id: ctx.user_id,
                joined: false,
            }),
            ziele,
        );
        tracing::debug!(
            connection_id = %ctx.connection_id,
            room_id = %req.room_id,
            "Raum verlassen"
        );
    }
    Ok(req)
}
