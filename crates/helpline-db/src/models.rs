/// Database row types — these map directly to SQLite rows.
/// Distinct from helpline-types models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct AdminRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub admin_type: String,
    pub created_at: String,
}

pub struct RoomRow {
    pub id: String,
    pub user_id: String,
    pub admin_username: String,
    pub admin_type: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub sender: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub is_read: bool,
    pub created_at: String,
}
