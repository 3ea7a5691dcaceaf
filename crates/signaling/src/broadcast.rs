//! Event-Broadcaster – Verteilt Server-Events an Verbindungen
//!
//! Der Broadcaster verwaltet die Send-Queues aller Verbindungen und die
//! Raum-Mitgliedschaften. Verteilt wird immer explizit: der Router
//! berechnet die Ziel-Verbindungen (aus Presence und Raum-Mitgliedschaft)
//! und ruft `deliver` auf. Es gibt keine implizite Raum-Magie.

use dashmap::DashMap;
use plauder_core::types::{ConnectionId, RoomId, UserId};
use plauder_protocol::{ServerEvent, ServerFrame};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// VerbindungsSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct VerbindungsSender {
    pub user_id: UserId,
    pub tx: mpsc::Sender<ServerFrame>,
}

impl VerbindungsSender {
    /// Reiht einen Frame nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, connection_id: ConnectionId, frame: ServerFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    user_id = %self.user_id,
                    "Send-Queue voll – Event verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %connection_id, "Send-Queue geschlossen");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

#[derive(Default)]
struct EventBroadcasterInner {
    verbindungen: DashMap<ConnectionId, VerbindungsSender>,
    /// Raum -> beigetretene Verbindungen
    raum_mitglieder: DashMap<RoomId, HashSet<ConnectionId>>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    pub fn verbindung_registrieren(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        queue_groesse: usize,
    ) -> mpsc::Receiver<ServerFrame> {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        self.inner
            .verbindungen
            .insert(connection_id, VerbindungsSender { user_id, tx });
        tracing::debug!(connection_id = %connection_id, user_id = %user_id, "Verbindung im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung und alle ihre Raum-Mitgliedschaften
    ///
    /// Gibt die Raeume zurueck, in denen die Verbindung Mitglied war.
    pub fn verbindung_entfernen(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        self.inner.verbindungen.remove(connection_id);

        let mut raeume = Vec::new();
        self.inner.raum_mitglieder.iter_mut().for_each(|mut entry| {
            if entry.value_mut().remove(connection_id) {
                raeume.push(*entry.key());
            }
        });
        self.inner
            .raum_mitglieder
            .retain(|_, mitglieder| !mitglieder.is_empty());

        tracing::debug!(connection_id = %connection_id, raeume = raeume.len(), "Verbindung aus Broadcaster entfernt");
        raeume
    }

    /// Fuegt eine Verbindung einem Raum hinzu
    ///
    /// Gibt `false` zurueck wenn sie bereits Mitglied war.
    pub fn raum_beitreten(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        self.inner
            .raum_mitglieder
            .entry(room_id)
            .or_default()
            .insert(connection_id)
    }

    /// Entfernt eine Verbindung aus einem Raum
    ///
    /// Gibt `false` zurueck wenn sie kein Mitglied war.
    pub fn raum_verlassen(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        let entfernt = self
            .inner
            .raum_mitglieder
            .get_mut(room_id)
            .map(|mut mitglieder| mitglieder.remove(connection_id))
            .unwrap_or(false);
        self.inner
            .raum_mitglieder
            .remove_if(room_id, |_, mitglieder| mitglieder.is_empty());
        entfernt
    }

    /// Alle Verbindungen die einem Raum beigetreten sind
    pub fn verbindungen_in_raum(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .raum_mitglieder
            .get(room_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn ist_im_raum(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        self.inner
            .raum_mitglieder
            .get(room_id)
            .is_some_and(|m| m.contains(connection_id))
    }

    /// Sendet einen Frame an genau eine Verbindung (z.B. eine Quittung)
    pub fn an_verbindung_senden(&self, connection_id: &ConnectionId, frame: ServerFrame) -> bool {
        match self.inner.verbindungen.get(connection_id) {
            Some(sender) => sender.senden(*connection_id, frame),
            None => {
                tracing::debug!(connection_id = %connection_id, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Verteilt ein Event an die angegebenen Verbindungen
    ///
    /// Doppelte Ziele werden zusammengefasst. Gibt die Anzahl der
    /// erfolgreichen Zustellungen zurueck.
    pub fn deliver<I>(&self, event: ServerEvent, ziele: I) -> usize
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        let ziele: BTreeSet<ConnectionId> = ziele.into_iter().collect();
        let mut gesendet = 0;
        for connection_id in &ziele {
            if let Some(sender) = self.inner.verbindungen.get(connection_id) {
                if sender.senden(*connection_id, ServerFrame::push(event.clone())) {
                    gesendet += 1;
                }
            }
        }
        tracing::trace!(event = event.name(), ziele = ziele.len(), gesendet, "Event verteilt");
        gesendet
    }

    /// Verteilt ein Event an alle registrierten Verbindungen
    pub fn an_alle_senden(&self, event: ServerEvent) -> usize {
        self.deliver(event, self.alle_verbindungen())
    }

    pub fn alle_verbindungen(&self) -> Vec<ConnectionId> {
        self.inner.verbindungen.iter().map(|e| *e.key()).collect()
    }

    pub fn verbindung_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(connection_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plauder_protocol::events::PresenceChange;

    fn test_event() -> ServerEvent {
        ServerEvent::UserOnline(PresenceChange {
            user_id: UserId::new(),
        })
    }

    #[tokio::test]
    async fn verbindung_registrieren_und_senden() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();

        let mut rx = broadcaster.verbindung_registrieren(conn, UserId::new(), 8);
        assert!(broadcaster.ist_registriert(&conn));

        assert_eq!(broadcaster.deliver(test_event(), [conn]), 1);
        let frame = rx.try_recv().expect("Frame muss vorhanden sein");
        assert_eq!(frame.request_id, None);
        assert_eq!(frame.event.name(), "userOnline");
    }

    #[tokio::test]
    async fn deliver_nur_an_ziele() {
        let broadcaster = EventBroadcaster::neu();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        let c3 = ConnectionId::new();

        let mut rx1 = broadcaster.verbindung_registrieren(c1, UserId::new(), 8);
        let mut rx2 = broadcaster.verbindung_registrieren(c2, UserId::new(), 8);
        let mut rx3 = broadcaster.verbindung_registrieren(c3, UserId::new(), 8);

        // Doppeltes Ziel wird nur einmal beliefert
        let gesendet = broadcaster.deliver(test_event(), vec![c1, c2, c1]);
        assert_eq!(gesendet, 2);

        assert!(rx1.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err(), "c3 darf nichts empfangen");
    }

    #[tokio::test]
    async fn raum_mitgliedschaft() {
        let broadcaster = EventBroadcaster::neu();
        let raum = RoomId::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();
        let _rx1 = broadcaster.verbindung_registrieren(c1, UserId::new(), 8);
        let _rx2 = broadcaster.verbindung_registrieren(c2, UserId::new(), 8);

        assert!(broadcaster.raum_beitreten(c1, raum));
        assert!(!broadcaster.raum_beitreten(c1, raum));
        broadcaster.raum_beitreten(c2, raum);
        assert_eq!(broadcaster.verbindungen_in_raum(&raum).len(), 2);

        assert!(broadcaster.raum_verlassen(&c1, &raum));
        assert!(!broadcaster.raum_verlassen(&c1, &raum));
        assert!(!broadcaster.ist_im_raum(&c1, &raum));
        assert_eq!(broadcaster.verbindungen_in_raum(&raum), vec![c2]);
    }

    #[test]
    fn verbindung_entfernen_bereinigt_raeume() {
        let broadcaster = EventBroadcaster::neu();
        let raum = RoomId::new();
        let conn = ConnectionId::new();

        let _rx = broadcaster.verbindung_registrieren(conn, UserId::new(), 8);
        broadcaster.raum_beitreten(conn, raum);

        let raeume = broadcaster.verbindung_entfernen(&conn);
        assert_eq!(raeume, vec![raum]);
        assert!(!broadcaster.ist_registriert(&conn));
        assert!(broadcaster.verbindungen_in_raum(&raum).is_empty());
    }

    #[tokio::test]
    async fn volle_queue_verwirft() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();
        let _rx = broadcaster.verbindung_registrieren(conn, UserId::new(), 1);

        assert_eq!(broadcaster.deliver(test_event(), [conn]), 1);
        assert_eq!(broadcaster.deliver(test_event(), [conn]), 0);
    }
}
