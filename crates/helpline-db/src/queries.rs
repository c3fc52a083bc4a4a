use rusqlite::Connection;

use crate::Database;
use crate::Result;
use crate::models::{AdminRow, MessageRow, RoomRow, UserRow};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Admins --

    pub fn create_admin(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        admin_type: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO admins (id, username, password, admin_type) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, admin_type),
            )?;
            Ok(())
        })
    }

    pub fn get_admin_by_username(&self, username: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| query_admin_by_username(conn, username))
    }

    /// First admin registered for the type. Least-loaded selection is a
    /// documented alternative, not implemented.
    pub fn find_admin_by_type(&self, admin_type: &str) -> Result<Option<AdminRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, password, admin_type, created_at
                 FROM admins WHERE admin_type = ?1 ORDER BY rowid LIMIT 1",
            )?;
            let row = stmt.query_row([admin_type], map_admin_row).optional()?;
            Ok(row)
        })
    }

    // -- Rooms --

    /// Insert a new room. Returns `StoreError::Duplicate` if another writer
    /// already created the room for this (user_id, admin_type) pair.
    pub fn insert_room(
        &self,
        id: &str,
        user_id: &str,
        admin_username: &str,
        admin_type: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms (id, user_id, admin_username, admin_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, admin_username, admin_type, created_at),
            )?;
            Ok(())
        })
    }

    pub fn find_room_for_user(&self, user_id: &str, admin_type: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, admin_username, admin_type, created_at
                 FROM rooms WHERE user_id = ?1 AND admin_type = ?2",
            )?;
            let row = stmt
                .query_row([user_id, admin_type], map_room_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn find_room_for_admin(
        &self,
        admin_username: &str,
        user_id: &str,
    ) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, admin_username, admin_type, created_at
                 FROM rooms WHERE admin_username = ?1 AND user_id = ?2",
            )?;
            let row = stmt
                .query_row([admin_username, user_id], map_room_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_room(&self, id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, admin_username, admin_type, created_at
                 FROM rooms WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_room_row).optional()?;
            Ok(row)
        })
    }

    pub fn rooms_by_admin_type(&self, admin_type: &str) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, admin_username, admin_type, created_at
                 FROM rooms WHERE admin_type = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([admin_type], map_room_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        room_id: &str,
        sender: &str,
        ciphertext: &[u8],
        nonce: &[u8],
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, sender, ciphertext, nonce, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                rusqlite::params![id, room_id, sender, ciphertext, nonce, created_at],
            )?;
            Ok(())
        })
    }

    /// Newest-first page of messages. Ties on created_at break by insertion
    /// order (rowid), which is the room's total order.
    pub fn messages_page(&self, room_id: &str, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, sender, ciphertext, nonce, is_read, created_at
                 FROM messages WHERE room_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![room_id, limit, offset], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn last_message(&self, room_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, sender, ciphertext, nonce, is_read, created_at
                 FROM messages WHERE room_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
            )?;
            let row = stmt.query_row([room_id], map_message_row).optional()?;
            Ok(row)
        })
    }

    /// Unread messages in the room not sent by `requester`.
    pub fn count_unread(&self, room_id: &str, requester: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE room_id = ?1 AND sender != ?2 AND is_read = 0",
                [room_id, requester],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Bulk-mark every unread message not sent by `requester` as read.
    /// Returns the number of rows changed; a second call is a no-op.
    pub fn mark_messages_read(&self, room_id: &str, requester: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE room_id = ?1 AND sender != ?2 AND is_read = 0",
                [room_id, requester],
            )?;
            Ok(changed as u64)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_admin_by_username(conn: &Connection, username: &str) -> Result<Option<AdminRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password, admin_type, created_at FROM admins WHERE username = ?1",
    )?;

    let row = stmt.query_row([username], map_admin_row).optional()?;

    Ok(row)
}

fn map_admin_row(row: &rusqlite::Row<'_>) -> std::result::Result<AdminRow, rusqlite::Error> {
    Ok(AdminRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        admin_type: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_room_row(row: &rusqlite::Row<'_>) -> std::result::Result<RoomRow, rusqlite::Error> {
    Ok(RoomRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        admin_username: row.get(2)?,
        admin_type: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        sender: row.get(2)?,
        ciphertext: row.get(3)?,
        nonce: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, StoreError};

    fn db_with_room(room_id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_room(
            room_id,
            "alice",
            "bob_admin",
            "Billing Support",
            "2025-01-05T14:32:00Z",
        )
        .unwrap();
        db
    }

    #[test]
    fn duplicate_room_insert_is_rejected() {
        let db = db_with_room("r1");

        // Same (user, admin_type) pair, fresh id: the constraint must fire.
        let err = db
            .insert_room(
                "r2",
                "alice",
                "bob_admin",
                "Billing Support",
                "2025-01-05T14:33:00Z",
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));

        // Same user, different admin type is fine.
        db.insert_room(
            "r3",
            "alice",
            "eve_admin",
            "Technical Support",
            "2025-01-05T14:33:00Z",
        )
        .unwrap();
    }

    #[test]
    fn foreign_key_failure_is_not_reported_as_duplicate() {
        let db = db_with_room("r1");

        // Inserting into a room that does not exist trips the foreign key,
        // which is a constraint violation but not a uniqueness one. It must
        // surface as a plain store error so callers do not retry a lookup.
        let err = db
            .insert_message(
                "m1",
                "no_such_room",
                "alice",
                b"ct",
                b"nonce",
                "2025-01-05T14:33:00Z",
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn mark_read_excludes_requester_and_is_idempotent() {
        let db = db_with_room("r1");
        db.insert_message("m1", "r1", "alice", b"c1", b"n1", "2025-01-05T14:32:01Z")
            .unwrap();
        db.insert_message("m2", "r1", "alice", b"c2", b"n2", "2025-01-05T14:32:02Z")
            .unwrap();
        db.insert_message("m3", "r1", "bob_admin", b"c3", b"n3", "2025-01-05T14:32:03Z")
            .unwrap();

        assert_eq!(db.count_unread("r1", "bob_admin").unwrap(), 2);
        assert_eq!(db.count_unread("r1", "alice").unwrap(), 1);

        assert_eq!(db.mark_messages_read("r1", "bob_admin").unwrap(), 2);
        assert_eq!(db.mark_messages_read("r1", "bob_admin").unwrap(), 0);

        // alice's own unread view is untouched by bob's marking
        assert_eq!(db.count_unread("r1", "alice").unwrap(), 1);
    }

    #[test]
    fn pages_are_newest_first_with_rowid_tiebreak() {
        let db = db_with_room("r1");
        // Identical timestamps: insertion order must decide.
        for i in 1..=5 {
            db.insert_message(
                &format!("m{i}"),
                "r1",
                "alice",
                b"c",
                b"n",
                "2025-01-05T14:32:00Z",
            )
            .unwrap();
        }

        let page0 = db.messages_page("r1", 3, 0).unwrap();
        let ids: Vec<&str> = page0.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m5", "m4", "m3"]);

        let page1 = db.messages_page("r1", 3, 3).unwrap();
        let ids: Vec<&str> = page1.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1"]);
    }

    #[test]
    fn first_registered_admin_wins_selection() {
        let db = Database::open_in_memory().unwrap();
        db.create_admin("a1", "bob_admin", "hash", "Billing Support")
            .unwrap();
        db.create_admin("a2", "carol_admin", "hash", "Billing Support")
            .unwrap();

        let admin = db.find_admin_by_type("Billing Support").unwrap().unwrap();
        assert_eq!(admin.username, "bob_admin");
        assert!(db.find_admin_by_type("HR").unwrap().is_none());
    }
}
