//! SQLite-Implementierung des RoomRepository

use chrono::{SubsecRound, Utc};
use plauder_core::types::{RoomId, UserId};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{RaumRecord, RaumTyp};
use crate::repository::{DbResult, RoomRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{format_timestamp, parse_id, parse_timestamp};

/// Schluessel eines Benutzerpaars, unabhaengig von der Reihenfolge
fn paar_schluessel(a: UserId, b: UserId) -> String {
    let (klein, gross) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", klein.inner(), gross.inner())
}

impl RoomRepository for SqliteDb {
    async fn find_or_create_private_room(&self, a: UserId, b: UserId) -> DbResult<RaumRecord> {
        let schluessel = paar_schluessel(a, b);
        let now = Utc::now().trunc_subsecs(3);

        // Gleichzeitige Erstanfragen beider Seiten duerfen nur einen Raum erzeugen
        sqlx::query(
            "INSERT INTO chat_rooms (id, room_type, name, private_key, created_at)
             VALUES (?, 'private', NULL, ?, ?)
             ON CONFLICT(private_key) DO NOTHING",
        )
        .bind(RoomId::new().inner().to_string())
        .bind(&schluessel)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, room_type, name, created_at FROM chat_rooms WHERE private_key = ?",
        )
        .bind(&schluessel)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::intern(format!("Privater Raum {schluessel} fehlt nach Anlage")))?;

        row_to_raum(&row)
    }

    async fn get_room(&self, id: RoomId) -> DbResult<Option<RaumRecord>> {
        let row = sqlx::query("SELECT id, room_type, name, created_at FROM chat_rooms WHERE id = ?")
            .bind(id.inner().to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_raum(&r)).transpose()
    }

    async fn create_group_room(&self, name: &str) -> DbResult<RaumRecord> {
        let id = RoomId::new();
        let now = Utc::now().trunc_subsecs(3);

        sqlx::query(
            "INSERT INTO chat_rooms (id, room_type, name, private_key, created_at)
             VALUES (?, 'group', ?, NULL, ?)",
        )
        .bind(id.inner().to_string())
        .bind(name)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(RaumRecord {
            id,
            typ: RaumTyp::Gruppe,
            name: Some(name.to_string()),
            created_at: now,
        })
    }
}

fn row_to_raum(row: &sqlx::sqlite::SqliteRow) -> DbResult<RaumRecord> {
    let id_str: String = row.try_get("id")?;
    let typ_str: String = row.try_get("room_type")?;
    let name: Option<String> = row.try_get("name")?;
    let created_str: String = row.try_get("created_at")?;

    let typ = RaumTyp::aus_str(&typ_str)
        .ok_or_else(|| DbError::UngueltigeDaten(format!("Unbekannter Raumtyp: {typ_str}")))?;

    Ok(RaumRecord {
        id: parse_id(&id_str, "id")?,
        typ,
        name,
        created_at: parse_timestamp(&created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paar_schluessel_ist_symmetrisch() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(paar_schluessel(a, b), paar_schluessel(b, a));
        assert_ne!(paar_schluessel(a, b), paar_schluessel(a, UserId::new()));
    }
}
