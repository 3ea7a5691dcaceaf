//! Anruf-Register – Zustandsautomat der aktiven Anruf-Sessions
//!
//! ```text
//!              annehmen
//! ongoing ───────────────> ongoing (angenommen)
//!    │                         │
//!    └──── missed | completed | declined ◄┘   (terminal, Session entfernt)
//! ```
//!
//! Nur `ongoing`-Sessions liegen im Register. Eine beendete Session wird
//! entfernt; jede spaetere Referenz auf ihre ID ergibt `NichtGefunden`.
//! Pro ungeordnetem Benutzerpaar gibt es hoechstens eine Session.
//!
//! Das Beenden ist zweistufig (`abschluss_beginnen` -> `abschliessen`),
//! weil zwischen beiden Schritten der Endstatus gespeichert wird. Waehrend
//! dieser Zeit gilt die Session fuer alle anderen Operationen als beendet.

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use plauder_core::types::{AnrufStatus, AnrufTyp, CallId, UserId};
use plauder_protocol::events::CallInfo;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{SignalingError, SignalingResult};

/// Eine aktive Anruf-Session
#[derive(Debug, Clone)]
pub struct AnrufSession {
    pub id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub call_type: AnrufTyp,
    pub started_at: DateTime<Utc>,
    /// Ohne Annahme bis hierhin endet der Anruf als `missed`
    pub klingelt_bis: Instant,
    pub angenommen_um: Option<Instant>,
    /// Anlage im Speicher abgeschlossen
    pub gespeichert: bool,
    /// Endstatus wird gerade gespeichert
    pub endet: bool,
}

impl AnrufSession {
    pub fn ist_beteiligt(&self, user_id: &UserId) -> bool {
        self.caller_id == *user_id || self.receiver_id == *user_id
    }

    /// Gegenueber des Benutzers (None wenn nicht beteiligt)
    pub fn gegenueber(&self, user_id: &UserId) -> Option<UserId> {
        if self.caller_id == *user_id {
            Some(self.receiver_id)
        } else if self.receiver_id == *user_id {
            Some(self.caller_id)
        } else {
            None
        }
    }

    /// Gespraechsdauer seit der Annahme in Sekunden
    pub fn dauer_sek(&self) -> u64 {
        self.angenommen_um
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Endstatus bei Abbruch durch den Server (Timeout, Verbindungsverlust)
    pub fn abbruch_status(&self) -> AnrufStatus {
        if self.angenommen_um.is_some() {
            AnrufStatus::Completed
        } else {
            AnrufStatus::Missed
        }
    }

    pub fn info(&self, status: AnrufStatus) -> CallInfo {
        CallInfo {
            call_id: self.id,
            caller_id: self.caller_id,
            receiver_id: self.receiver_id,
            call_type: self.call_type,
            status,
            started_at: self.started_at,
            duration_secs: if status.ist_terminal() { self.dauer_sek() } else { 0 },
        }
    }
}

fn paar(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Default)]
struct AnrufRegisterInner {
    sessions: HashMap<CallId, AnrufSession>,
    paare: HashMap<(UserId, UserId), CallId>,
}

impl AnrufRegisterInner {
    /// Session fuer Operationen ausser dem Beenden (endende zaehlen als weg)
    fn aktiv(&mut self, call_id: &CallId) -> SignalingResult<&mut AnrufSession> {
        match self.sessions.get_mut(call_id) {
            Some(s) if !s.endet => Ok(s),
            _ => Err(SignalingError::anruf_nicht_gefunden(*call_id)),
        }
    }
}

/// Register aller laufenden Anrufe dieses Prozesses
///
/// Ein Mutex schuetzt Session- und Paar-Index gemeinsam, damit beide
/// immer zueinander passen.
#[derive(Default)]
pub struct AnrufRegister {
    inner: Mutex<AnrufRegisterInner>,
}

impl AnrufRegister {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt eine neue `ongoing`-Session an
    ///
    /// Schlaegt fehl wenn fuer das Paar bereits eine Session existiert,
    /// egal in welcher Richtung.
    pub fn reservieren(
        &self,
        caller_id: UserId,
        receiver_id: UserId,
        call_type: AnrufTyp,
        klingel_timeout: Duration,
    ) -> SignalingResult<AnrufSession> {
        let mut inner = self.inner.lock();
        let schluessel = paar(caller_id, receiver_id);

        if let Some(laufend) = inner.paare.get(&schluessel) {
            return Err(SignalingError::AnrufBesetzt(*laufend));
        }

        let session = AnrufSession {
            id: CallId::new(),
            caller_id,
            receiver_id,
            call_type,
            started_at: Utc::now().trunc_subsecs(3),
            klingelt_bis: Instant::now() + klingel_timeout,
            angenommen_um: None,
            gespeichert: false,
            endet: false,
        };
        inner.paare.insert(schluessel, session.id);
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// Verwirft eine Reservierung deren Anlage nicht gespeichert werden konnte
    pub fn freigeben(&self, call_id: &CallId) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.sessions.remove(call_id) {
            inner
                .paare
                .remove(&paar(session.caller_id, session.receiver_id));
        }
    }

    pub fn als_gespeichert_markieren(&self, call_id: &CallId) {
        if let Some(session) = self.inner.lock().sessions.get_mut(call_id) {
            session.gespeichert = true;
        }
    }

    /// Kopie einer aktiven Session
    pub fn session(&self, call_id: &CallId) -> SignalingResult<AnrufSession> {
        self.inner.lock().aktiv(call_id).map(|s| s.clone())
    }

    /// Angerufener nimmt an
    pub fn annehmen(&self, call_id: &CallId, user_id: &UserId) -> SignalingResult<AnrufSession> {
        let mut inner = self.inner.lock();
        let session = inner.aktiv(call_id)?;

        if session.receiver_id != *user_id {
            return Err(SignalingError::ungueltig(
                "Nur der Angerufene kann den Anruf annehmen",
            ));
        }
        if session.angenommen_um.is_some() {
            return Err(SignalingError::ungueltig("Anruf wurde bereits angenommen"));
        }

        session.angenommen_um = Some(Instant::now());
        Ok(session.clone())
    }

    /// Erster Schritt des Beendens: Session sperren
    pub fn abschluss_beginnen(&self, call_id: &CallId) -> SignalingResult<AnrufSession> {
        let mut inner = self.inner.lock();
        let session = inner.aktiv(call_id)?;
        session.endet = true;
        Ok(session.clone())
    }

    /// Speichern des Endstatus fehlgeschlagen: Session bleibt `ongoing`
    pub fn abschluss_abbrechen(&self, call_id: &CallId) {
        if let Some(session) = self.inner.lock().sessions.get_mut(call_id) {
            session.endet = false;
        }
    }

    /// Zweiter Schritt: Session entfernen (terminal)
    pub fn abschliessen(&self, call_id: &CallId) -> Option<AnrufSession> {
        let mut inner = self.inner.lock();
        let session = inner.sessions.remove(call_id)?;
        inner
            .paare
            .remove(&paar(session.caller_id, session.receiver_id));
        Some(session)
    }

    /// Gespeicherte, unbeantwortete Sessions deren Klingelzeit abgelaufen ist
    pub fn abgelaufene(&self, jetzt: Instant) -> Vec<CallId> {
        self.inner
            .lock()
            .sessions
            .values()
            .filter(|s| {
                s.gespeichert && !s.endet && s.angenommen_um.is_none() && s.klingelt_bis <= jetzt
            })
            .map(|s| s.id)
            .collect()
    }

    /// Gespeicherte Sessions an denen der Benutzer beteiligt ist
    pub fn sessions_von(&self, user_id: &UserId) -> Vec<CallId> {
        self.inner
            .lock()
            .sessions
            .values()
            .filter(|s| s.gespeichert && !s.endet && s.ist_beteiligt(user_id))
            .map(|s| s.id)
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.inner.lock().sessions.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KLINGELN: Duration = Duration::from_secs(45);

    #[test]
    fn zweiter_anruf_fuer_paar_abgelehnt() {
        let register = AnrufRegister::neu();
        let a = UserId::new();
        let b = UserId::new();

        let erster = register.reservieren(a, b, AnrufTyp::Audio, KLINGELN).unwrap();
        // Gegenrichtung zaehlt als dasselbe Paar
        let fehler = register
            .reservieren(b, a, AnrufTyp::Video, KLINGELN)
            .unwrap_err();
        assert!(matches!(fehler, SignalingError::AnrufBesetzt(id) if id == erster.id));

        // Anderes Paar ist unabhaengig
        assert!(register
            .reservieren(a, UserId::new(), AnrufTyp::Audio, KLINGELN)
            .is_ok());
    }

    #[test]
    fn nach_abschluss_ist_paar_wieder_frei() {
        let register = AnrufRegister::neu();
        let a = UserId::new();
        let b = UserId::new();

        let s = register.reservieren(a, b, AnrufTyp::Audio, KLINGELN).unwrap();
        register.abschluss_beginnen(&s.id).unwrap();
        register.abschliessen(&s.id).unwrap();

        assert_eq!(register.anzahl(), 0);
        assert!(register.reservieren(b, a, AnrufTyp::Audio, KLINGELN).is_ok());
    }

    #[test]
    fn beendete_session_nicht_gefunden() {
        let register = AnrufRegister::neu();
        let a = UserId::new();
        let b = UserId::new();
        let s = register.reservieren(a, b, AnrufTyp::Audio, KLINGELN).unwrap();
        register.abschluss_beginnen(&s.id).unwrap();
        register.abschliessen(&s.id);

        assert!(matches!(
            register.annehmen(&s.id, &b),
            Err(SignalingError::NichtGefunden(_))
        ));
        assert!(matches!(
            register.session(&s.id),
            Err(SignalingError::NichtGefunden(_))
        ));
        assert!(register.abschluss_beginnen(&s.id).is_err());
    }

    #[test]
    fn endende_session_ist_gesperrt() {
        let register = AnrufRegister::neu();
        let b = UserId::new();
        let s = register
            .reservieren(UserId::new(), b, AnrufTyp::Audio, KLINGELN)
            .unwrap();

        register.abschluss_beginnen(&s.id).unwrap();
        assert!(register.abschluss_beginnen(&s.id).is_err());
        assert!(register.annehmen(&s.id, &b).is_err());

        register.abschluss_abbrechen(&s.id);
        assert!(register.annehmen(&s.id, &b).is_ok());
    }

    #[test]
    fn nur_angerufener_nimmt_an() {
        let register = AnrufRegister::neu();
        let a = UserId::new();
        let b = UserId::new();
        let s = register.reservieren(a, b, AnrufTyp::Video, KLINGELN).unwrap();

        assert!(matches!(
            register.annehmen(&s.id, &a),
            Err(SignalingError::UngueltigesArgument(_))
        ));
        let angenommen = register.annehmen(&s.id, &b).unwrap();
        assert!(angenommen.angenommen_um.is_some());
        assert_eq!(angenommen.abbruch_status(), AnrufStatus::Completed);
        assert!(register.annehmen(&s.id, &b).is_err());
    }

    #[test]
    fn freigeben_entfernt_reservierung() {
        let register = AnrufRegister::neu();
        let a = UserId::new();
        let b = UserId::new();
        let s = register.reservieren(a, b, AnrufTyp::Audio, KLINGELN).unwrap();

        register.freigeben(&s.id);
        assert_eq!(register.anzahl(), 0);
        assert!(register.reservieren(a, b, AnrufTyp::Audio, KLINGELN).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn klingel_timeout_nur_fuer_gespeicherte_unbeantwortete() {
        let register = AnrufRegister::neu();
        let b = UserId::new();
        let klingelt = register
            .reservieren(UserId::new(), b, AnrufTyp::Audio, KLINGELN)
            .unwrap();
        let angenommen = register
            .reservieren(UserId::new(), b, AnrufTyp::Audio, KLINGELN)
            .unwrap();
        let ungespeichert = register
            .reservieren(UserId::new(), b, AnrufTyp::Audio, KLINGELN)
            .unwrap();
        register.als_gespeichert_markieren(&klingelt.id);
        register.als_gespeichert_markieren(&angenommen.id);
        register.annehmen(&angenommen.id, &b).unwrap();

        assert!(register.abgelaufene(Instant::now()).is_empty());

        tokio::time::advance(KLINGELN + Duration::from_secs(1)).await;
        assert_eq!(register.abgelaufene(Instant::now()), vec![klingelt.id]);
        assert!(!register.sessions_von(&b).contains(&ungespeichert.id));
    }

    #[test]
    fn gegenueber_und_beteiligung() {
        let register = AnrufRegister::neu();
        let a = UserId::new();
        let b = UserId::new();
        let s = register.reservieren(a, b, AnrufTyp::Audio, KLINGELN).unwrap();

        assert_eq!(s.gegenueber(&a), Some(b));
        assert_eq!(s.gegenueber(&b), Some(a));
        assert_eq!(s.gegenueber(&UserId::new()), None);
        assert_eq!(s.abbruch_status(), AnrufStatus::Missed);
        assert_eq!(s.info(AnrufStatus::Ongoing).duration_secs, 0);
    }
}
