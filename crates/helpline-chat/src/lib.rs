//! The chat engine: room resolution/creation, encrypted message persistence,
//! read-state tracking and room summaries. Realtime fan-out lives in
//! helpline-gateway and is layered on top — the store stays the single
//! source of truth and never depends on delivery.

pub mod directory;
pub mod error;
pub mod messages;

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};

use helpline_crypto::Codec;
use helpline_db::Database;
use helpline_db::models::RoomRow;
use helpline_types::models::Room;

pub use error::{ChatError, Result};

/// The engine's dependencies, passed in explicitly: the persistence handle
/// and the message codec. Handlers share one instance behind an `Arc`.
pub struct ChatService {
    db: Arc<Database>,
    codec: Codec,
}

impl ChatService {
    pub fn new(db: Arc<Database>, codec: Codec) -> Self {
        Self { db, codec }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn codec(&self) -> &Codec {
        &self.codec
    }
}

pub(crate) fn room_from_row(row: RoomRow) -> Result<Room> {
    Ok(Room {
        id: row
            .id
            .parse()
            .map_err(|_| ChatError::Corrupt(format!("room id '{}'", row.id)))?,
        admin_type: row
            .admin_type
            .parse()
            .map_err(|_| ChatError::Corrupt(format!("admin type '{}'", row.admin_type)))?,
        user_id: row.user_id,
        admin_username: row.admin_username,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

/// SQLite default timestamps come back as "YYYY-MM-DD HH:MM:SS" without a
/// timezone; rows written by this crate use RFC 3339. Accept both.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|_| ChatError::Corrupt(format!("timestamp '{raw}'")))
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use helpline_crypto::keys::generate_message_key;

    pub fn service() -> ChatService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        ChatService::new(db, Codec::new(generate_message_key()))
    }

    pub fn service_with_admin(username: &str, admin_type: &str) -> ChatService {
        let svc = service();
        svc.db()
            .create_admin(&uuid::Uuid::new_v4().to_string(), username, "hash", admin_type)
            .unwrap();
        svc
    }
}
