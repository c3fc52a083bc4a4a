use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use helpline_types::api::{
    Claims, MarkReadResponse, MessageView, OpenRoomResponse, ResolveRoomResponse,
    RoomView, SendMessageRequest,
};
use helpline_types::events::{GatewayEvent, RoomEvent};
use helpline_types::models::{AdminType, ChatMessage, Room, format_timestamp};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::middleware::{require_admin, require_user};

/// Page size used when a room is opened; further history is paged through
/// `get_messages`.
const OPEN_PAGE_LIMIT: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub page: u32,
}

fn default_limit() -> u32 {
    20
}

/// User-side room resolution: find or lazily create the room for this
/// admin type. The admin bound to the room is fixed at creation.
pub async fn resolve_user_room(
    State(state): State<AppState>,
    Path(admin_type): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let username = require_user(&claims)?.to_string();
    let admin_type = parse_admin_type(&admin_type)?;

    let chat = state.chat.clone();
    let room =
        blocking(move || chat.resolve_or_create_room_for_user(&username, admin_type)).await?;

    Ok(Json(ResolveRoomResponse { room_id: room.id }))
}

/// User opens a chat: resolve/create the room, mark the other party's
/// messages read, return the newest history page.
pub async fn open_user_room(
    State(state): State<AppState>,
    Path(admin_type): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let username = require_user(&claims)?.to_string();
    let admin_type = parse_admin_type(&admin_type)?;

    let chat = state.chat.clone();
    let response = blocking(move || {
        let room = chat.resolve_or_create_room_for_user(&username, admin_type)?;
        open_room(&chat, room, &username)
    })
    .await?;

    Ok(Json(response))
}

/// Admin opens a chat with a user. Admins never create rooms: a missing
/// room is a 404, not a creation.
pub async fn open_admin_room(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (admin_username, _) = require_admin(&claims)?;
    let admin_username = admin_username.to_string();

    let chat = state.chat.clone();
    let response = blocking(move || {
        let room = chat.resolve_room_for_admin(&admin_username, &user)?;
        open_room(&chat, room, &admin_username)
    })
    .await?;

    Ok(Json(response))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(200);
    let page = query.page;

    let chat = state.chat.clone();
    let messages = blocking(move || chat.fetch_page(room_id, limit, page)).await?;

    Ok(Json(messages.into_iter().map(view).collect::<Vec<_>>()))
}

/// REST send path, equivalent to the gateway's `send_message` command:
/// encrypt and persist, then fan the plaintext event out to whoever is
/// currently joined. Persistence failing means nothing is broadcast.
pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sender = claims.username.clone();

    let chat = state.chat.clone();
    let text = req.message.clone();
    let stored = blocking(move || chat.append_message(room_id, &text, &sender)).await?;

    state
        .dispatcher
        .broadcast(
            room_id,
            GatewayEvent::ReceiveMessage(RoomEvent {
                username: stored.sender.clone(),
                message: stored.message.clone(),
                room: room_id,
                created_at: format_timestamp(stored.created_at),
            }),
        )
        .await;

    Ok((StatusCode::CREATED, Json(view(stored))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = claims.username.clone();

    let chat = state.chat.clone();
    let count = blocking(move || chat.mark_read(room_id, &requester)).await?;

    Ok(Json(MarkReadResponse { count }))
}

/// Mark-before-fetch, so the summary a dashboard computes next reflects the
/// party having seen the room.
fn open_room(
    chat: &helpline_chat::ChatService,
    room: Room,
    requester: &str,
) -> Result<OpenRoomResponse, helpline_chat::ChatError> {
    // The engine scopes marking to messages the requester did not send.
    let marked_read = chat.mark_read(room.id, requester)?;
    let messages = chat.fetch_page(room.id, OPEN_PAGE_LIMIT, 0)?;

    Ok(OpenRoomResponse {
        room: RoomView {
            id: room.id,
            user_id: room.user_id,
            admin_username: room.admin_username,
            admin_type: room.admin_type,
        },
        messages: messages.into_iter().map(view).collect(),
        marked_read,
    })
}

fn view(msg: ChatMessage) -> MessageView {
    MessageView {
        id: msg.id,
        sender: msg.sender,
        message: msg.message,
        read: msg.read,
        created_at: format_timestamp(msg.created_at),
    }
}

fn parse_admin_type(raw: &str) -> Result<AdminType, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("unknown admin type"))
}
