use axum::{Extension, Json, extract::State, response::IntoResponse};

use helpline_chat::{ChatError, ChatService};
use helpline_types::api::{ChatUpdate, Claims, DashboardResponse};
use helpline_types::models::{Room, format_timestamp};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::{require_admin, require_user};

/// User dashboard: one row per admin type the user has an open room with.
/// Summaries are recomputed from the store on every request — no caching,
/// so they are always consistent with what a room open would show.
pub async fn user_updates(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let username = require_user(&claims)?.to_string();

    let chat = state.chat.clone();
    let response = blocking(move || {
        let rooms = chat.list_rooms_for_user(&username)?;
        summaries(&chat, rooms, &username, |room| room.admin_type.to_string())
    })
    .await?;

    Ok(Json(response))
}

/// Admin dashboard: one row per room of the admin's type. Rooms assigned to
/// other admins of the same type are visible but summarized from this
/// admin's perspective.
pub async fn admin_updates(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (admin_username, admin_type) = require_admin(&claims)?;
    let admin_username = admin_username.to_string();

    let chat = state.chat.clone();
    let response = blocking(move || {
        let rooms = chat.list_rooms_by_admin_type(admin_type)?;
        summaries(&chat, rooms, &admin_username, |room| room.user_id.clone())
    })
    .await?;

    Ok(Json(response))
}

fn summaries(
    chat: &ChatService,
    rooms: Vec<Room>,
    requester: &str,
    display_name: impl Fn(&Room) -> String,
) -> Result<DashboardResponse, ChatError> {
    let mut chats = Vec::with_capacity(rooms.len());
    let mut total_unread_chats = 0;

    for room in rooms {
        let summary = chat.summarize(room.id, requester)?;
        if summary.unread_count > 0 {
            total_unread_chats += 1;
        }
        chats.push(ChatUpdate {
            user: display_name(&room),
            room_id: room.id,
            unread_count: summary.unread_count,
            last_message: summary.last_message,
            last_time: summary.last_time.map(format_timestamp),
            last_sender: summary.last_sender,
            last_message_read: summary.last_message_read,
        });
    }

    Ok(DashboardResponse {
        chats,
        total_unread_chats,
    })
}
