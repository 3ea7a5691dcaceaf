//! Anruf-Steuerung auf Client-Seite
//!
//! ```text
//! Leerlauf ──anrufen──> Medien ──> Ruft ──callAccepted──> Verbunden
//!     │                                                     │
//!     └──incomingCall──> Klingelt ──annehmen──> Medien ─────┘
//!
//! jeder Zustand ──callEnded / auflegen / ICE failed──> Beendet
//! ```
//!
//! Pro Anrufversuch wird eine neue Peer-Verbindung gebaut. Beim Uebergang
//! nach `Beendet` werden Peer-Verbindung und lokale Medien immer abgebaut,
//! egal welcher Weg dorthin gefuehrt hat. Die Steuerung spricht nicht
//! selbst mit dem Server; sie liefert die zu sendenden Events zurueck.

use plauder_core::types::{AnrufStatus, AnrufTyp, CallId, UserId};
use plauder_protocol::events::{
    AnswerCallRequest, CallInfo, DeclineCallRequest, EndCallRequest, IceCandidateMessage, Signal,
    StartCallRequest,
};
use plauder_protocol::{ClientEvent, ServerEvent};

use crate::error::{ClientError, ClientResult};

/// Lokale Kamera/Mikrofon
#[allow(async_fn_in_trait)]
pub trait MedienQuelle {
    async fn erfassen(&mut self, typ: AnrufTyp) -> ClientResult<()>;

    /// Stoppt alle lokalen Spuren
    fn stoppen(&mut self);
}

/// Eine WebRTC-Peer-Verbindung
#[allow(async_fn_in_trait)]
pub trait PeerVerbindung {
    async fn offer_erstellen(&mut self) -> ClientResult<Signal>;
    async fn answer_erstellen(&mut self, offer: &Signal) -> ClientResult<Signal>;
    async fn remote_setzen(&mut self, answer: &Signal) -> ClientResult<()>;
    async fn ice_hinzufuegen(&mut self, kandidat: &Signal) -> ClientResult<()>;
    fn schliessen(&mut self);
}

/// Baut pro Anrufversuch eine neue Peer-Verbindung
pub trait PeerFabrik {
    type Peer: PeerVerbindung;

    fn erstellen(&mut self) -> ClientResult<Self::Peer>;
}

/// ICE-Verbindungszustand der Peer-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceZustand {
    Neu,
    Pruefen,
    Verbunden,
    Getrennt,
    Fehlgeschlagen,
    Geschlossen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnrufZustand {
    Leerlauf,
    /// Lokale Medien werden geholt
    Medien,
    Klingelt {
        call_id: CallId,
        von: UserId,
        call_type: AnrufTyp,
        offer: Signal,
    },
    /// `call_id` kommt mit der Quittung von `startCall`
    Ruft {
        call_id: Option<CallId>,
        ziel: UserId,
    },
    Verbunden {
        call_id: CallId,
        gegenueber: UserId,
    },
    Beendet {
        call_id: Option<CallId>,
        status: AnrufStatus,
    },
}

pub struct AnrufSteuerung<M: MedienQuelle, F: PeerFabrik> {
    user_id: UserId,
    medien: M,
    fabrik: F,
    peer: Option<F::Peer>,
    medien_aktiv: bool,
    zustand: AnrufZustand,
    /// Lokale ICE-Kandidaten bevor die Call-ID bekannt ist
    ice_puffer: Vec<Signal>,
}

impl<M: MedienQuelle, F: PeerFabrik> AnrufSteuerung<M, F> {
    pub fn neu(user_id: UserId, medien: M, fabrik: F) -> Self {
        Self {
            user_id,
            medien,
            fabrik,
            peer: None,
            medien_aktiv: false,
            zustand: AnrufZustand::Leerlauf,
            ice_puffer: Vec::new(),
        }
    }

    pub fn zustand(&self) -> &AnrufZustand {
        &self.zustand
    }

    pub fn aktueller_anruf(&self) -> Option<CallId> {
        match &self.zustand {
            AnrufZustand::Klingelt { call_id, .. } | AnrufZustand::Verbunden { call_id, .. } => {
                Some(*call_id)
            }
            AnrufZustand::Ruft { call_id, .. } => *call_id,
            _ => None,
        }
    }

    fn ist_frei(&self) -> bool {
        matches!(
            self.zustand,
            AnrufZustand::Leerlauf | AnrufZustand::Beendet { .. }
        )
    }

    // -----------------------------------------------------------------------
    // Ausgehend
    // -----------------------------------------------------------------------

    /// Holt Medien, erstellt das Offer und liefert `startCall`
    pub async fn anrufen(&mut self, ziel: UserId, typ: AnrufTyp) -> ClientResult<ClientEvent> {
        if !self.ist_frei() {
            return Err(ClientError::UngueltigerZustand(format!(
                "Anruf nicht moeglich in {:?}",
                self.zustand
            )));
        }
        self.zustand = AnrufZustand::Medien;

        let offer = match self.offer_vorbereiten(typ).await {
            Ok(offer) => offer,
            Err(e) => {
                self.abbauen();
                self.zustand = AnrufZustand::Leerlauf;
                return Err(e);
            }
        };

        self.zustand = AnrufZustand::Ruft {
            call_id: None,
            ziel,
        };
        Ok(ClientEvent::StartCall(StartCallRequest {
            caller_id: self.user_id,
            user_to_call: ziel,
            signal_data: offer,
            call_type: typ,
        }))
    }

    async fn offer_vorbereiten(&mut self, typ: AnrufTyp) -> ClientResult<Signal> {
        self.medien_aktiv = true;
        self.medien.erfassen(typ).await?;
        let peer = self.peer.insert(self.fabrik.erstellen()?);
        peer.offer_erstellen().await
    }

    /// Quittung von `startCall`; liefert gepufferte ICE-Kandidaten
    ///
    /// Wurde inzwischen aufgelegt, wird der angelegte Anruf gleich beendet.
    pub fn anruf_bestaetigt(&mut self, info: &CallInfo) -> Vec<ClientEvent> {
        match self.zustand {
            AnrufZustand::Ruft {
                call_id: None,
                ziel,
            } if ziel == info.receiver_id => {
                self.zustand = AnrufZustand::Ruft {
                    call_id: Some(info.call_id),
                    ziel,
                };
                self.ice_puffer
                    .drain(..)
                    .map(|kandidat| {
                        ClientEvent::IceCandidate(IceCandidateMessage {
                            call_id: info.call_id,
                            candidate: kandidat,
                            user_id: ziel,
                        })
                    })
                    .collect()
            }
            AnrufZustand::Beendet { call_id: None, status } if info.caller_id == self.user_id => {
                self.zustand = AnrufZustand::Beendet {
                    call_id: Some(info.call_id),
                    status,
                };
                vec![ende(info.call_id, status)]
            }
            _ => Vec::new(),
        }
    }

    /// `startCall` wurde abgelehnt (offline, besetzt, Speicherfehler)
    pub fn anruf_fehlgeschlagen(&mut self) {
        if let AnrufZustand::Ruft { call_id: None, .. } = self.zustand {
            self.beenden(AnrufStatus::Missed);
        }
    }

    // -----------------------------------------------------------------------
    // Eingehend
    // -----------------------------------------------------------------------

    /// Holt Medien, erstellt die Answer und liefert `answerCall`
    ///
    /// Schlagen Medien oder Peer fehl, endet der Anruf lokal; der Aufrufer
    /// sollte dann `declineCall` senden.
    pub async fn annehmen(&mut self) -> ClientResult<ClientEvent> {
        let AnrufZustand::Klingelt {
            call_id,
            von,
            call_type,
            ref offer,
        } = self.zustand
        else {
            return Err(ClientError::UngueltigerZustand("Kein klingelnder Anruf".into()));
        };
        let offer = offer.clone();
        self.zustand = AnrufZustand::Medien;

        match self.answer_vorbereiten(call_type, &offer).await {
            Ok(answer) => {
                self.zustand = AnrufZustand::Verbunden {
                    call_id,
                    gegenueber: von,
                };
                Ok(ClientEvent::AnswerCall(AnswerCallRequest {
                    call_id,
                    signal: answer,
                }))
            }
            Err(e) => {
                self.abbauen();
                self.zustand = AnrufZustand::Beendet {
                    call_id: Some(call_id),
                    status: AnrufStatus::Declined,
                };
                Err(e)
            }
        }
    }

    async fn answer_vorbereiten(&mut self, typ: AnrufTyp, offer: &Signal) -> ClientResult<Signal> {
        self.medien_aktiv = true;
        self.medien.erfassen(typ).await?;
        let peer = self.peer.insert(self.fabrik.erstellen()?);
        peer.answer_erstellen(offer).await
    }

    pub fn ablehnen(&mut self) -> ClientResult<ClientEvent> {
        let AnrufZustand::Klingelt { call_id, .. } = self.zustand else {
            return Err(ClientError::UngueltigerZustand("Kein klingelnder Anruf".into()));
        };
        self.beenden(AnrufStatus::Declined);
        Ok(ClientEvent::DeclineCall(DeclineCallRequest { call_id }))
    }

    // -----------------------------------------------------------------------
    // Beenden
    // -----------------------------------------------------------------------

    /// Lokales Auflegen; liefert das Event fuer den Server, falls noetig
    pub fn auflegen(&mut self) -> Option<ClientEvent> {
        let event = match self.zustand {
            AnrufZustand::Verbunden { call_id, .. } => {
                Some(ende(call_id, AnrufStatus::Completed))
            }
            AnrufZustand::Ruft {
                call_id: Some(call_id),
                ..
            } => Some(ende(call_id, AnrufStatus::Missed)),
            AnrufZustand::Klingelt { call_id, .. } => {
                Some(ClientEvent::DeclineCall(DeclineCallRequest { call_id }))
            }
            _ => None,
        };

        let status = match self.zustand {
            AnrufZustand::Verbunden { .. } => AnrufStatus::Completed,
            AnrufZustand::Klingelt { .. } => AnrufStatus::Declined,
            _ => AnrufStatus::Missed,
        };
        if !self.ist_frei() {
            self.beenden(status);
        }
        event
    }

    /// ICE-Zustand der Peer-Verbindung; Abbruch beendet den Anruf sofort
    pub fn ice_zustand(&mut self, zustand: IceZustand) -> Option<ClientEvent> {
        match zustand {
            IceZustand::Fehlgeschlagen | IceZustand::Getrennt if self.peer.is_some() => {
                tracing::warn!(call_id = ?self.aktueller_anruf(), ?zustand, "ICE-Verbindung verloren");
                self.auflegen()
            }
            _ => None,
        }
    }

    /// Lokaler ICE-Kandidat fuer das Gegenueber
    pub fn lokaler_kandidat(&mut self, kandidat: Signal) -> Option<ClientEvent> {
        match self.zustand {
            AnrufZustand::Ruft { call_id: None, .. } => {
                self.ice_puffer.push(kandidat);
                None
            }
            AnrufZustand::Ruft {
                call_id: Some(call_id),
                ziel: gegenueber,
            }
            | AnrufZustand::Verbunden {
                call_id,
                gegenueber,
            } => Some(ClientEvent::IceCandidate(IceCandidateMessage {
                call_id,
                candidate: kandidat,
                user_id: gegenueber,
            })),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Server-Events
    // -----------------------------------------------------------------------

    /// Verarbeitet einen Push; liefert Events die gesendet werden muessen
    pub async fn server_event(&mut self, event: &ServerEvent) -> Vec<ClientEvent> {
        match event {
            ServerEvent::IncomingCall(e) => {
                if self.ist_frei() {
                    self.zustand = AnrufZustand::Klingelt {
                        call_id: e.call_id,
                        von: e.from,
                        call_type: e.call_type,
                        offer: e.signal.clone(),
                    };
                    Vec::new()
                } else {
                    tracing::info!(call_id = %e.call_id, von = %e.from, "Besetzt, eingehender Anruf abgelehnt");
                    vec![ClientEvent::DeclineCall(DeclineCallRequest { call_id: e.call_id })]
                }
            }

            ServerEvent::CallAccepted(e) => {
                let AnrufZustand::Ruft { call_id, .. } = self.zustand else {
                    return Vec::new();
                };
                if call_id.is_some_and(|id| id != e.call_id) {
                    return Vec::new();
                }

                let ergebnis = match self.peer.as_mut() {
                    Some(peer) => peer.remote_setzen(&e.signal).await,
                    None => Err(ClientError::UngueltigerZustand("Keine Peer-Verbindung".into())),
                };
                if let Err(fehler) = ergebnis {
                    tracing::warn!(call_id = %e.call_id, %fehler, "Answer nicht anwendbar");
                    self.beenden(AnrufStatus::Missed);
                    return vec![ende(e.call_id, AnrufStatus::Missed)];
                }

                let gepuffert: Vec<Signal> = self.ice_puffer.drain(..).collect();
                self.zustand = AnrufZustand::Verbunden {
                    call_id: e.call_id,
                    gegenueber: e.answerer_id,
                };
                gepuffert
                    .into_iter()
                    .map(|kandidat| {
                        ClientEvent::IceCandidate(IceCandidateMessage {
                            call_id: e.call_id,
                            candidate: kandidat,
                            user_id: e.answerer_id,
                        })
                    })
                    .collect()
            }

            ServerEvent::IceCandidate(e) => {
                if self.aktueller_anruf() == Some(e.call_id) {
                    if let Some(peer) = self.peer.as_mut() {
                        // Einzelne Kandidaten duerfen scheitern
                        if let Err(fehler) = peer.ice_hinzufuegen(&e.candidate).await {
                            tracing::warn!(call_id = %e.call_id, %fehler, "ICE-Kandidat verworfen");
                        }
                    }
                }
                Vec::new()
            }

            ServerEvent::CallEnded(e) => {
                if self.aktueller_anruf() == Some(e.call_id) {
                    self.beenden(e.status);
                }
                Vec::new()
            }

            _ => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Abbau
    // -----------------------------------------------------------------------

    fn beenden(&mut self, status: AnrufStatus) {
        let call_id = self.aktueller_anruf();
        self.abbauen();
        self.zustand = AnrufZustand::Beendet { call_id, status };
        tracing::info!(call_id = ?call_id, status = status.als_str(), "Anruf lokal beendet");
    }

    fn abbauen(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.schliessen();
        }
        if self.medien_aktiv {
            self.medien.stoppen();
            self.medien_aktiv = false;
        }
        self.ice_puffer.clear();
    }
}

impl<M: MedienQuelle, F: PeerFabrik> Drop for AnrufSteuerung<M, F> {
    fn drop(&mut self) {
        self.abbauen();
    }
}

fn ende(call_id: CallId, status: AnrufStatus) -> ClientEvent {
    ClientEvent::EndCall(EndCallRequest {
        call_id,
        status: status.als_str().to_string(),
    })
}
