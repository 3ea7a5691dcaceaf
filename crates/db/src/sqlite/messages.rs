//! SQLite-Implementierung des MessageRepository

use chrono::{SubsecRound, Utc};
use plauder_core::types::MessageId;
use sqlx::Row;

use crate::models::{NachrichtRecord, NachrichtenFilter, NeueNachricht};
use crate::repository::{DbResult, MessageRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{format_timestamp, parse_id, parse_timestamp};

impl MessageRepository for SqliteDb {
    async fn save_message(&self, data: NeueNachricht<'_>) -> DbResult<NachrichtRecord> {
        let id = MessageId::new();
        let now = Utc::now().trunc_subsecs(3);

        sqlx::query(
            "INSERT INTO chat_messages
             (id, room_id, sender_id, receiver_id, content, attachment, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.inner().to_string())
        .bind(data.room_id.inner().to_string())
        .bind(data.sender_id.inner().to_string())
        .bind(data.receiver_id.map(|u| u.inner().to_string()))
        .bind(data.text)
        .bind(data.attachment)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await?;

        Ok(NachrichtRecord {
            id,
            room_id: data.room_id,
            sender_id: data.sender_id,
            receiver_id: data.receiver_id,
            text: data.text.to_string(),
            attachment: data.attachment.map(str::to_string),
            created_at: now,
        })
    }

    async fn find_history(&self, filter: NachrichtenFilter) -> DbResult<Vec<NachrichtRecord>> {
        let room_str = filter.room_id.inner().to_string();

        // Neueste N laden, rowid trennt gleiche Zeitstempel in Einfuegereihenfolge
        let rows = if let Some(before) = filter.before {
            sqlx::query(
                "SELECT id, room_id, sender_id, receiver_id, content, attachment, created_at
                 FROM chat_messages
                 WHERE room_id = ? AND created_at < ?
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?",
            )
            .bind(&room_str)
            .bind(format_timestamp(before))
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, room_id, sender_id, receiver_id, content, attachment, created_at
                 FROM chat_messages
                 WHERE room_id = ?
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?",
            )
            .bind(&room_str)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?
        };

        // Chronologisch (aelteste zuerst)
        let mut records: Vec<NachrichtRecord> =
            rows.iter().map(row_to_nachricht).collect::<DbResult<_>>()?;
        records.reverse();
        Ok(records)
    }
}

fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    let id_str: String = row.try_get("id")?;
    let room_str: String = row.try_get("room_id")?;
    let sender_str: String = row.try_get("sender_id")?;
    let receiver_str: Option<String> = row.try_get("receiver_id")?;
    let text: String = row.try_get("content")?;
    let attachment: Option<String> = row.try_get("attachment")?;
    let created_str: String = row.try_get("created_at")?;

    Ok(NachrichtRecord {
        id: parse_id(&id_str, "id")?,
        room_id: parse_id(&room_str, "room_id")?,
        sender_id: parse_id(&sender_str, "sender_id")?,
        receiver_id: receiver_str
            .map(|s| parse_id(&s, "receiver_id"))
            .transpose()?,
        text,
        attachment,
        created_at: parse_timestamp(&created_str)?,
    })
}
