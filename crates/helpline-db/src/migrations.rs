use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS admins (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            admin_type  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_admins_type
            ON admins(admin_type);

        -- One room per (user, admin_type): the UNIQUE constraint is what
        -- resolves concurrent first-contact creation races.
        CREATE TABLE IF NOT EXISTS rooms (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            admin_username  TEXT NOT NULL,
            admin_type      TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, admin_type)
        );

        CREATE INDEX IF NOT EXISTS idx_rooms_admin_type
            ON rooms(admin_type);

        CREATE INDEX IF NOT EXISTS idx_rooms_admin
            ON rooms(admin_username, user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            room_id     TEXT NOT NULL REFERENCES rooms(id),
            sender      TEXT NOT NULL,
            ciphertext  BLOB NOT NULL,
            nonce       BLOB NOT NULL,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, created_at);

        -- Covers unread counts and bulk read-marking
        CREATE INDEX IF NOT EXISTS idx_messages_unread
            ON messages(room_id, is_read, sender);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
