//! Presence-Handler – Verbindungsaufbau, -abbau und `getOnlineUsers`

use plauder_core::types::{ConnectionId, UserId};
use plauder_protocol::events::{PresenceChange, RoomMembershipEvent};
use plauder_protocol::{ServerEvent, ServerFrame};
use tokio::sync::mpsc;

use crate::dispatcher::VerbindungsKontext;
use crate::error::SignalingResult;
use crate::handlers::call_handler;
use crate::server_state::{SignalingState, Speicher};

/// Meldet eine neue Verbindung an
///
/// Die erste Verbindung eines Benutzers wird allen Verbindungen als
/// `userOnline` plus aktueller `onlineUsers`-Liste gemeldet. Jede neue
/// Verbindung bekommt die Liste in jedem Fall.
pub fn verbinden<R: Speicher>(
    user_id: UserId,
    state: &SignalingState<R>,
) -> (VerbindungsKontext, mpsc::Receiver<ServerFrame>) {
    let ctx = VerbindungsKontext {
        connection_id: ConnectionId::new(),
        user_id,
    };

    let rx = state.broadcaster.verbindung_registrieren(
        ctx.connection_id,
        user_id,
        state.config.send_queue_groesse,
    );

    if state.presence.register(user_id, ctx.connection_id) {
        state
            .broadcaster
            .an_alle_senden(ServerEvent::UserOnline(PresenceChange { user_id }));
        state
            .broadcaster
            .an_alle_senden(ServerEvent::OnlineUsers(state.presence.list_online()));
    } else {
        state.broadcaster.deliver(
            ServerEvent::OnlineUsers(state.presence.list_online()),
            [ctx.connection_id],
        );
    }

    (ctx, rx)
}

/// Meldet eine Verbindung ab
///
/// Raum-Mitglieder erfahren vom Verlassen. War es die letzte Verbindung
/// des Benutzers, geht `userOffline` an alle und seine laufenden Anrufe
/// werden beendet.
pub async fn trennen<R: Speicher>(ctx: VerbindungsKontext, state: &SignalingState<R>) {
    for room_id in state.broadcaster.verbindung_entfernen(&ctx.connection_id) {
        state.broadcaster.deliver(
            ServerEvent::RoomMembership(RoomMembershipEvent {
                room_id,
                user_id: ctx.user_id,
                joined: false,
            }),
            state.broadcaster.verbindungen_in_raum(&room_id),
        );
    }

    let Some(abmeldung) = state.presence.unregister(ctx.connection_id) else {
        return;
    };

    if abmeldung.offline {
        state.broadcaster.an_alle_senden(ServerEvent::UserOffline(PresenceChange {
            user_id: abmeldung.user_id,
        }));
        state
            .broadcaster
            .an_alle_senden(ServerEvent::OnlineUsers(state.presence.list_online()));

        let beendet = call_handler::anrufe_des_users_beenden(abmeldung.user_id, state).await;
        if beendet > 0 {
            tracing::info!(user_id = %abmeldung.user_id, anrufe = beendet, "Anrufe nach Verbindungsverlust beendet");
        }
    }
}

/// `getOnlineUsers` – Momentaufnahme, zusaetzlich als `onlineUsers` an die
/// anfragende Verbindung
pub fn get_online_users<R: Speicher>(
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<Vec<UserId>> {
    let online = state.presence.list_online();
    state
        .broadcaster
        .deliver(ServerEvent::OnlineUsers(online.clone()), [ctx.connection_id]);
    Ok(online)
}
