//! Handler fuer alle Client-Events
//!
//! Jeder Handler bekommt die Nutzdaten, den Kontext der ausloesenden
//! Verbindung und den gemeinsamen `SignalingState`. Er liefert die Daten
//! fuer die Quittung oder einen `SignalingError`. Verteilt wird nur nach
//! erfolgreicher Speicherung.

pub mod call_handler;
pub mod chat_handler;
pub mod presence_handler;
pub mod room_handler;

use plauder_core::types::UserId;

use crate::dispatcher::VerbindungsKontext;
use crate::error::{SignalingError, SignalingResult};

/// Absender in den Nutzdaten muss der Benutzer der Verbindung sein
fn absender_pruefen(angegeben: UserId, ctx: &VerbindungsKontext, feld: &str) -> SignalingResult<()> {
    if angegeben != ctx.user_id {
        return Err(SignalingError::ungueltig(format!(
            "{feld} passt nicht zum Benutzer der Verbindung"
        )));
    }
    Ok(())
}
