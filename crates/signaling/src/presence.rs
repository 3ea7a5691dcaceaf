//! Presence-Registry – Welcher Benutzer hat welche Verbindungen?
//!
//! Die Registry ist eine Multimap `UserId -> {ConnectionId}` mit
//! Rueckwaerts-Index `ConnectionId -> UserId`. Ein Benutzer ist genau dann
//! online, wenn er mindestens eine Verbindung hat. Mehrere Tabs oder Geraete
//! desselben Benutzers sind erlaubt und werden nicht dedupliziert.
//!
//! Die Registry meldet Online/Offline-Wechsel ueber den Rueckgabewert. Das
//! Verteilen an alle Verbindungen uebernimmt der Router.

use dashmap::DashMap;
use plauder_core::types::{ConnectionId, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// Ergebnis einer Abmeldung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abmeldung {
    pub user_id: UserId,
    /// `true` wenn das die letzte Verbindung des Benutzers war
    pub offline: bool,
}

/// Verwaltet den Online-Status aller verbundenen Benutzer
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    inner: Arc<PresenceRegistryInner>,
}

#[derive(Default)]
struct PresenceRegistryInner {
    /// Benutzer -> aktive Verbindungen (nie leer)
    verbindungen: DashMap<UserId, HashSet<ConnectionId>>,
    /// Verbindung -> Benutzer
    besitzer: DashMap<ConnectionId, UserId>,
}

impl PresenceRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Verbindung ein
    ///
    /// Gibt `true` zurueck wenn der Benutzer dadurch online wurde.
    pub fn register(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        self.inner.besitzer.insert(connection_id, user_id);

        let mut eintrag = self.inner.verbindungen.entry(user_id).or_default();
        let erste = eintrag.is_empty();
        eintrag.insert(connection_id);

        if erste {
            tracing::info!(user_id = %user_id, connection_id = %connection_id, "Benutzer online");
        } else {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                verbindungen = eintrag.len(),
                "Weitere Verbindung"
            );
        }
        erste
    }

    /// Entfernt eine Verbindung per Rueckwaerts-Lookup
    ///
    /// `None` wenn die Verbindung unbekannt war.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Abmeldung> {
        let (_, user_id) = self.inner.besitzer.remove(&connection_id)?;

        if let Some(mut eintrag) = self.inner.verbindungen.get_mut(&user_id) {
            eintrag.remove(&connection_id);
        }
        let offline = self
            .inner
            .verbindungen
            .remove_if(&user_id, |_, verbindungen| verbindungen.is_empty())
            .is_some();

        if offline {
            tracing::info!(user_id = %user_id, "Benutzer offline");
        }
        Some(Abmeldung { user_id, offline })
    }

    /// Momentaufnahme aller Online-Benutzer (sortiert)
    pub fn list_online(&self) -> Vec<UserId> {
        let mut liste: Vec<UserId> = self.inner.verbindungen.iter().map(|e| *e.key()).collect();
        liste.sort();
        liste
    }

    pub fn ist_online(&self, user_id: &UserId) -> bool {
        self.inner.verbindungen.contains_key(user_id)
    }

    /// Alle aktiven Verbindungen eines Benutzers
    pub fn verbindungen_von(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.inner
            .verbindungen
            .get(user_id)
            .map(|v| v.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn besitzer_von(&self, connection_id: &ConnectionId) -> Option<UserId> {
        self.inner.besitzer.get(connection_id).map(|e| *e.value())
    }

    pub fn online_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    pub fn verbindung_anzahl(&self) -> usize {
        self.inner.besitzer.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
