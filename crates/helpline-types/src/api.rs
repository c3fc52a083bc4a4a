use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AdminType, Role};

// -- JWT Claims --

/// JWT claims shared between helpline-api (REST middleware) and
/// helpline-gateway (WebSocket authentication). The canonical definition
/// lives here to eliminate duplication. This is the authenticated principal:
/// the chat core trusts it and performs no credential checks of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_type: Option<AdminType>,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminRegisterRequest {
    pub username: String,
    pub password: String,
    pub admin_type: AdminType,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_type: Option<AdminType>,
    pub token: String,
}

// -- Rooms & messages --

#[derive(Debug, Serialize)]
pub struct ResolveRoomResponse {
    pub room_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub message: String,
}

/// A decrypted message ready for display; `created_at` carries the
/// dashboard timestamp pattern.
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: Uuid,
    pub sender: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct RoomView {
    pub id: Uuid,
    pub user_id: String,
    pub admin_username: String,
    pub admin_type: AdminType,
}

#[derive(Debug, Serialize)]
pub struct OpenRoomResponse {
    pub room: RoomView,
    /// Oldest-first page of decrypted history
    pub messages: Vec<MessageView>,
    /// Messages flipped to read by opening the room
    pub marked_read: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub count: u64,
}

// -- Dashboards --

/// One row of a dashboard: the counterpart's display name plus the room's
/// derived summary. `user` is the admin type on the user dashboard and the
/// user's username on the admin dashboard.
#[derive(Debug, Serialize)]
pub struct ChatUpdate {
    pub user: String,
    pub room_id: Uuid,
    pub unread_count: u64,
    pub last_message: Option<String>,
    pub last_time: Option<String>,
    pub last_sender: Option<String>,
    pub last_message_read: bool,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub chats: Vec<ChatUpdate>,
    /// Number of rooms with at least one unread message
    pub total_unread_chats: usize,
}
