//! Anruf-Handler – Vermittlung von WebRTC-Anrufen
//!
//! Der Server interpretiert SDP und ICE-Kandidaten nie, er leitet sie nur
//! an die Verbindungen des Gegenuebers weiter. Anlage und Endstatus eines
//! Anrufs werden gespeichert, bevor irgendetwas verteilt wird.

use plauder_core::types::{AnrufStatus, CallId, UserId};
use plauder_db::models::{AnrufRecord, NeuerAnruf};
use plauder_protocol::events::{
    AnswerCallRequest, CallAcceptedEvent, CallEndedEvent, CallInfo, DeclineCallRequest,
    EndCallRequest, IceCandidateMessage, IncomingCallEvent, StartCallRequest,
};
use plauder_protocol::ServerEvent;
use serde::Serialize;
use tokio::time::Instant;

use crate::dispatcher::VerbindungsKontext;
use crate::error::{SignalingError, SignalingResult};
use crate::handlers::absender_pruefen;
use crate::server_state::{SignalingState, Speicher};

/// Quittungs-Daten fuer `iceCandidate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IceWeiterleitung {
    /// Anzahl der Verbindungen die den Kandidaten bekommen haben
    #[serde(rename = "delivered")]
    pub zugestellt: usize,
}

fn call_info(r: AnrufRecord) -> CallInfo {
    CallInfo {
        call_id: r.id,
        caller_id: r.caller_id,
        receiver_id: r.receiver_id,
        call_type: r.call_type,
        status: r.status,
        started_at: r.started_at,
        duration_secs: r.duration_secs,
    }
}

/// `startCall` – Anruf anlegen und das Offer an den Angerufenen leiten
///
/// Das Paar wird vor dem Speichern reserviert: ein zweiter `startCall`
/// fuer dasselbe Paar scheitert auch dann, wenn der erste noch auf den
/// Speicher wartet.
pub async fn start_call<R: Speicher>(
    req: StartCallRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<CallInfo> {
    absender_pruefen(req.caller_id, ctx, "callerId")?;

    if req.user_to_call == req.caller_id {
        return Err(SignalingError::ungueltig("Anruf an sich selbst"));
    }
    if !state.presence.ist_online(&req.user_to_call) {
        return Err(SignalingError::PeerNichtErreichbar(req.user_to_call));
    }

    let session = state.anrufe.reservieren(
        req.caller_id,
        req.user_to_call,
        req.call_type,
        state.config.klingel_timeout(),
    )?;

    let neu = NeuerAnruf {
        id: session.id,
        caller_id: session.caller_id,
        receiver_id: session.receiver_id,
        call_type: session.call_type,
        started_at: session.started_at,
    };
    if let Err(e) = state.db.create_call(neu).await {
        state.anrufe.freigeben(&session.id);
        tracing::error!(call_id = %session.id, fehler = %e, "Anruf konnte nicht gespeichert werden");
        return Err(e.into());
    }
    state.anrufe.als_gespeichert_markieren(&session.id);

    // Der Angerufene kann waehrend des Speicherns gegangen sein
    let ziele = state.presence.verbindungen_von(&req.user_to_call);
    if ziele.is_empty() {
        if let Err(e) = anruf_abschliessen(session.id, AnrufStatus::Missed, None, state).await {
            // Session bleibt aktiv, der Klingel-Timeout beendet sie spaeter
            tracing::warn!(
                call_id = %session.id,
                fehler = %e,
                "Anruf an getrennten Benutzer konnte nicht abgeschlossen werden"
            );
        }
        return Err(SignalingError::PeerNichtErreichbar(req.user_to_call));
    }

    state.broadcaster.deliver(
        ServerEvent::IncomingCall(IncomingCallEvent {
            call_id: session.id,
            from: req.caller_id,
            call_type: req.call_type,
            signal: req.signal_data,
        }),
        ziele,
    );

    tracing::info!(
        call_id = %session.id,
        caller_id = %session.caller_id,
        receiver_id = %session.receiver_id,
        call_type = session.call_type.als_str(),
        "Anruf gestartet"
    );
    Ok(session.info(AnrufStatus::Ongoing))
}

/// `answerCall` – Answer an die Verbindungen des Anrufers leiten
pub async fn answer_call<R: Speicher>(
    req: AnswerCallRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<CallInfo> {
    let session = state.anrufe.annehmen(&req.call_id, &ctx.user_id)?;

    let zugestellt = state.broadcaster.deliver(
        ServerEvent::CallAccepted(CallAcceptedEvent {
            call_id: session.id,
            signal: req.signal,
            answerer_id: ctx.user_id,
        }),
        state.presence.verbindungen_von(&session.caller_id),
    );
    if zugestellt == 0 {
        tracing::warn!(call_id = %session.id, caller_id = %session.caller_id, "Anrufer nicht mehr erreichbar");
    }

    tracing::info!(call_id = %session.id, user_id = %ctx.user_id, "Anruf angenommen");
    Ok(session.info(AnrufStatus::Ongoing))
}

/// `iceCandidate` – reines Weiterleiten an das Gegenueber
///
/// Ein nicht erreichbares Ziel wird nur geloggt; bereits ausgehandelte
/// Kandidaten koennen weiter funktionieren.
pub fn ice_candidate<R: Speicher>(
    req: IceCandidateMessage,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<IceWeiterleitung> {
    let session = state.anrufe.session(&req.call_id)?;

    match session.gegenueber(&ctx.user_id) {
        Some(gegenueber) if gegenueber == req.user_id => {}
        Some(_) => {
            return Err(SignalingError::ungueltig(
                "Ziel des ICE-Kandidaten ist nicht am Anruf beteiligt",
            ))
        }
        None => {
            return Err(SignalingError::ungueltig(
                "Verbindung ist nicht am Anruf beteiligt",
            ))
        }
    }

    let ziele = state.presence.verbindungen_von(&req.user_id);
    if ziele.is_empty() {
        tracing::warn!(
            call_id = %req.call_id,
            ziel = %req.user_id,
            "ICE-Kandidat: Ziel ohne Verbindung, verworfen"
        );
        return Ok(IceWeiterleitung { zugestellt: 0 });
    }

    let zugestellt = state.broadcaster.deliver(
        ServerEvent::IceCandidate(IceCandidateMessage {
            call_id: req.call_id,
            candidate: req.candidate,
            user_id: ctx.user_id,
        }),
        ziele,
    );
    tracing::trace!(call_id = %req.call_id, zugestellt, "ICE-Kandidat weitergeleitet");
    Ok(IceWeiterleitung { zugestellt })
}

/// `endCall` – Anruf mit Endstatus beenden
///
/// Ein ungueltiger Status wird abgelehnt, bevor die Session angefasst wird.
pub async fn end_call<R: Speicher>(
    req: EndCallRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<CallInfo> {
    let status = AnrufStatus::terminal_aus_str(&req.status)
        .map_err(|e| SignalingError::ungueltig(e.to_string()))?;

    let session = state.anrufe.session(&req.call_id)?;
    if !session.ist_beteiligt(&ctx.user_id) {
        return Err(SignalingError::ungueltig(
            "Nur Beteiligte koennen den Anruf beenden",
        ));
    }

    anruf_abschliessen(req.call_id, status, Some(ctx), state).await
}

/// `declineCall` – Angerufener lehnt einen klingelnden Anruf ab
pub async fn decline_call<R: Speicher>(
    req: DeclineCallRequest,
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<CallInfo> {
    let session = state.anrufe.session(&req.call_id)?;
    if session.receiver_id != ctx.user_id {
        return Err(SignalingError::ungueltig(
            "Nur der Angerufene kann ablehnen",
        ));
    }
    if session.angenommen_um.is_some() {
        return Err(SignalingError::ungueltig(
            "Angenommener Anruf kann nicht abgelehnt werden",
        ));
    }

    anruf_abschliessen(req.call_id, AnrufStatus::Declined, Some(ctx), state).await
}

/// `getCallHistory` – gespeicherte Anrufe des Benutzers, neueste zuerst
pub async fn get_call_history<R: Speicher>(
    ctx: &VerbindungsKontext,
    state: &SignalingState<R>,
) -> SignalingResult<Vec<CallInfo>> {
    let records = state
        .db
        .calls_for_user(ctx.user_id, state.config.anruf_verlauf_limit)
        .await?;
    Ok(records.into_iter().map(call_info).collect())
}

/// Bringt eine Session in einen terminalen Zustand
///
/// Reihenfolge: Session sperren, Endstatus speichern, Session entfernen,
/// `callEnded` verteilen. Schlaegt das Speichern fehl, bleibt die Session
/// `ongoing` und nichts wird verteilt.
///
/// `ausloeser` ist die beendende Verbindung; sie bekommt die Quittung statt
/// des Events. `None` heisst: der Server beendet (Timeout, Verbindungsverlust).
pub async fn anruf_abschliessen<R: Speicher>(
    call_id: CallId,
    status: AnrufStatus,
    ausloeser: Option<&VerbindungsKontext>,
    state: &SignalingState<R>,
) -> SignalingResult<CallInfo> {
    let session = state.anrufe.abschluss_beginnen(&call_id)?;
    let dauer = session.dauer_sek();

    if let Err(e) = state.db.update_call_status(call_id, status, dauer).await {
        state.anrufe.abschluss_abbrechen(&call_id);
        tracing::error!(call_id = %call_id, fehler = %e, "Endstatus konnte nicht gespeichert werden");
        return Err(e.into());
    }

    let session = state.anrufe.abschliessen(&call_id).unwrap_or(session);
    let mut info = session.info(status);
    info.duration_secs = dauer;

    let ausgeschlossen = ausloeser.map(|k| k.connection_id);
    let ziele = state
        .presence
        .verbindungen_von(&session.caller_id)
        .into_iter()
        .chain(state.presence.verbindungen_von(&session.receiver_id))
        .filter(|c| Some(*c) != ausgeschlossen);

    state.broadcaster.deliver(
        ServerEvent::CallEnded(CallEndedEvent {
            call_id,
            status,
            ended_by: ausloeser.map(|k| k.user_id),
        }),
        ziele,
    );

    tracing::info!(
        call_id = %call_id,
        status = status.als_str(),
        dauer_sek = dauer,
        beendet_von = ?ausloeser.map(|k| k.user_id),
        "Anruf beendet"
    );
    Ok(info)
}

/// Beendet unbeantwortete Anrufe deren Klingelzeit abgelaufen ist
///
/// Gibt die Anzahl der beendeten Anrufe zurueck.
pub async fn klingel_timeouts_pruefen<R: Speicher>(state: &SignalingState<R>) -> usize {
    let mut beendet = 0;
    for call_id in state.anrufe.abgelaufene(Instant::now()) {
        match anruf_abschliessen(call_id, AnrufStatus::Missed, None, state).await {
            Ok(_) => beendet += 1,
            // Inzwischen anderweitig beendet
            Err(SignalingError::NichtGefunden(_)) => {}
            Err(e) => tracing::warn!(call_id = %call_id, fehler = %e, "Klingel-Timeout fehlgeschlagen"),
        }
    }
    beendet
}

/// Beendet alle Anrufe eines Benutzers ohne Verbindung
///
/// Angenommene Anrufe enden als `completed`, klingelnde als `missed`.
pub async fn anrufe_des_users_beenden<R: Speicher>(
    user_id: UserId,
    state: &SignalingState<R>,
) -> usize {
    let mut beendet = 0;
    for call_id in state.anrufe.sessions_von(&user_id) {
        let Ok(session) = state.anrufe.session(&call_id) else {
            continue;
        };
        match anruf_abschliessen(call_id, session.abbruch_status(), None, state).await {
            Ok(_) => beendet += 1,
            Err(SignalingError::NichtGefunden(_)) => {}
            Err(e) => tracing::warn!(call_id = %call_id, fehler = %e, "Anruf konnte nicht beendet werden"),
        }
    }
    beendet
}
