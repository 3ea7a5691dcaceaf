//! SQLite-Implementierung des CallRepository

use chrono::SubsecRound;
use plauder_core::types::{AnrufStatus, AnrufTyp, CallId, UserId};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{AnrufRecord, NeuerAnruf};
use crate::repository::{CallRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{format_timestamp, parse_id, parse_timestamp};

impl CallRepository for SqliteDb {
    async fn create_call(&self, data: NeuerAnruf) -> DbResult<AnrufRecord> {
        let started_at = data.started_at.trunc_subsecs(3);

        sqlx::query(
            "INSERT INTO calls
             (id, caller_id, receiver_id, call_type, status, started_at, duration_secs)
             VALUES (?, ?, ?, ?, 'ongoing', ?, 0)",
        )
        .bind(data.id.inner().to_string())
        .bind(data.caller_id.inner().to_string())
        .bind(data.receiver_id.inner().to_string())
        .bind(data.call_type.als_str())
        .bind(format_timestamp(started_at))
        .execute(&self.pool)
        .await?;

        Ok(AnrufRecord {
            id: data.id,
            caller_id: data.caller_id,
            receiver_id: data.receiver_id,
            call_type: data.call_type,
            status: AnrufStatus::Ongoing,
            started_at,
            duration_secs: 0,
        })
    }

    async fn update_call_status(
        &self,
        id: CallId,
        status: AnrufStatus,
        duration_secs: u64,
    ) -> DbResult<AnrufRecord> {
        let dauer = i64::try_from(duration_secs)
            .map_err(|_| DbError::UngueltigeDaten(format!("Dauer zu gross: {duration_secs}")))?;

        let affected = sqlx::query("UPDATE calls SET status = ?, duration_secs = ? WHERE id = ?")
            .bind(status.als_str())
            .bind(dauer)
            .bind(id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Anruf {id}")));
        }

        let row = sqlx::query(
            "SELECT id, caller_id, receiver_id, call_type, status, started_at, duration_secs
             FROM calls WHERE id = ?",
        )
        .bind(id.inner().to_string())
        .fetch_one(&self.pool)
        .await?;

        row_to_anruf(&row)
    }

    async fn calls_for_user(&self, user_id: UserId, limit: u32) -> DbResult<Vec<AnrufRecord>> {
        let user_str = user_id.inner().to_string();

        let rows = sqlx::query(
            "SELECT id, caller_id, receiver_id, call_type, status, started_at, duration_secs
             FROM calls
             WHERE caller_id = ? OR receiver_id = ?
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(&user_str)
        .bind(&user_str)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_anruf).collect()
    }
}

fn row_to_anruf(row: &sqlx::sqlite::SqliteRow) -> DbResult<AnrufRecord> {
    let id_str: String = row.try_get("id")?;
    let caller_str: String = row.try_get("caller_id")?;
    let receiver_str: String = row.try_get("receiver_id")?;
    let typ_str: String = row.try_get("call_type")?;
    let status_str: String = row.try_get("status")?;
    let started_str: String = row.try_get("started_at")?;
    let dauer: i64 = row.try_get("duration_secs")?;

    let call_type: AnrufTyp = typ_str.parse().map_err(DbError::UngueltigeDaten)?;
    let status: AnrufStatus = status_str
        .parse()
        .map_err(|e: plauder_core::UngueltigerAnrufStatus| DbError::UngueltigeDaten(e.to_string()))?;

    Ok(AnrufRecord {
        id: parse_id(&id_str, "id")?,
        caller_id: parse_id(&caller_str, "caller_id")?,
        receiver_id: parse_id(&receiver_str, "receiver_id")?,
        call_type,
        status,
        started_at: parse_timestamp(&started_str)?,
        duration_secs: u64::try_from(dauer).unwrap_or(0),
    })
}
