use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload carried by every room-scoped gateway event. `created_at` is
/// pre-formatted with the dashboard timestamp pattern ("05 Jan, 14:32").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    pub username: String,
    pub message: String,
    pub room: Uuid,
    pub created_at: String,
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { username: String, role: crate::models::Role },

    /// A message was persisted and is being fanned out to the room
    ReceiveMessage(RoomEvent),

    /// A connection joined the room's subscriber set
    JoinRoomAnnouncement(RoomEvent),

    /// A connection left the room's subscriber set
    LeaveRoomAnnouncement(RoomEvent),
}

impl GatewayEvent {
    /// The room this event is scoped to, if any. `Ready` is connection-local.
    pub fn room(&self) -> Option<Uuid> {
        match self {
            Self::ReceiveMessage(e)
            | Self::JoinRoomAnnouncement(e)
            | Self::LeaveRoomAnnouncement(e) => Some(e.room),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe this connection to a room's broadcasts
    JoinRoom { room: Uuid },

    /// Unsubscribe this connection from a room
    LeaveRoom { room: Uuid },

    /// Persist a message and fan it out to the room
    SendMessage { room: Uuid, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_snake_case_wire_names() {
        let cmd: GatewayCommand = serde_json::from_str(
            r#"{"type":"send_message","data":{"room":"00000000-0000-0000-0000-000000000001","message":"hi"}}"#,
        )
        .unwrap();
        assert!(matches!(cmd, GatewayCommand::SendMessage { .. }));
    }

    #[test]
    fn receive_message_event_shape() {
        let event = GatewayEvent::ReceiveMessage(RoomEvent {
            username: "alice".into(),
            message: "hi".into(),
            room: Uuid::nil(),
            created_at: "05 Jan, 14:32".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "receive_message");
        assert_eq!(json["data"]["username"], "alice");
        assert_eq!(json["data"]["created_at"], "05 Jan, 14:32");
    }
}
