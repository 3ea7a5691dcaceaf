//! Client-Connection – Verarbeitet die Events einer einzelnen Verbindung
//!
//! Jede Verbindung bekommt einen lokalen Task auf dem Router-`LocalSet`.
//! Der Task arbeitet die eingehenden Frames strikt nacheinander ab: ein
//! Event laeuft inklusive Speicherzugriff zu Ende, bevor das naechste
//! derselben Verbindung beginnt. Events verschiedener Verbindungen
//! verschraenken sich an den Speicher-Awaits.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::dispatcher::{MessageDispatcher, VerbindungsKontext};
use crate::handlers::presence_handler;
use crate::server_state::{SignalingState, Speicher};

pub struct ClientConnection<R: Speicher> {
    state: Arc<SignalingState<R>>,
    dispatcher: MessageDispatcher<R>,
    ctx: VerbindungsKontext,
}

impl<R: Speicher> ClientConnection<R> {
    pub fn neu(state: Arc<SignalingState<R>>, ctx: VerbindungsKontext) -> Self {
        let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
        Self {
            state,
            dispatcher,
            ctx,
        }
    }

    /// Verarbeitet Frames bis der Socket-Task den Eingang schliesst,
    /// danach wird die Verbindung abgemeldet
    pub async fn verarbeiten(self, mut eingang: mpsc::Receiver<String>) {
        tracing::info!(
            connection_id = %self.ctx.connection_id,
            user_id = %self.ctx.user_id,
            "Verbindung aktiv"
        );

        while let Some(text) = eingang.recv().await {
            if let Some(antwort) = self.dispatcher.text_verarbeiten(&text, &self.ctx).await {
                self.state
                    .broadcaster
                    .an_verbindung_senden(&self.ctx.connection_id, antwort);
            }
        }

        presence_handler::trennen(self.ctx, &self.state).await;
        tracing::info!(
            connection_id = %self.ctx.connection_id,
            user_id = %self.ctx.user_id,
            "Verbindungs-Task beendet"
        );
    }
}
