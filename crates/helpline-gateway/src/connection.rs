use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use helpline_chat::ChatService;
use helpline_types::api::Claims;
use helpline_types::events::{GatewayCommand, GatewayEvent, RoomEvent};
use helpline_types::models::format_timestamp;

use crate::dispatcher::Dispatcher;

/// Handle a single WebSocket connection: Identify handshake, then a select
/// loop over outbound room events and inbound commands. On any exit path the
/// connection is removed from every subscriber set it joined.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    chat: Arc<ChatService>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let claims = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };
    let username = claims.username.clone();

    info!("{} connected to gateway", username);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        username: username.clone(),
        role: claims.role,
    };
    let Ok(text) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(text.into())).await.is_err() {
        return;
    }

    // Step 3: Register a delivery channel and enter the event loop
    let (conn_id, mut event_rx) = dispatcher.register().await;

    // Forward room events -> client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read commands from client
    let dispatcher_recv = dispatcher.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, &chat, conn_id, &username_recv, cmd)
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            username_recv,
                            e,
                            log_snippet(&text)
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Mandatory cleanup: a dead connection must not linger in any room
    dispatcher.disconnect(conn_id).await;
    info!("{} disconnected from gateway", username);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    dispatcher: &Dispatcher,
    chat: &Arc<ChatService>,
    conn_id: Uuid,
    username: &str,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::JoinRoom { room } => {
            info!("{} joining room {}", username, room);
            dispatcher.join(conn_id, room).await;
            dispatcher
                .broadcast(
                    room,
                    GatewayEvent::JoinRoomAnnouncement(RoomEvent {
                        username: username.to_string(),
                        message: String::new(),
                        room,
                        created_at: format_timestamp(Utc::now()),
                    }),
                )
                .await;
        }

        GatewayCommand::LeaveRoom { room } => {
            info!("{} leaving room {}", username, room);
            dispatcher.leave(conn_id, room).await;
            dispatcher
                .broadcast(
                    room,
                    GatewayEvent::LeaveRoomAnnouncement(RoomEvent {
                        username: username.to_string(),
                        message: String::new(),
                        room,
                        created_at: format_timestamp(Utc::now()),
                    }),
                )
                .await;
        }

        GatewayCommand::SendMessage { room, message } => {
            info!("{} sent message to room {}", username, room);

            // Persist first (blocking sqlite work off the async runtime);
            // only a durable message is fanned out.
            let chat = chat.clone();
            let sender = username.to_string();
            let text = message.clone();
            let persisted = tokio::task::spawn_blocking(move || {
                chat.append_message(room, &text, &sender)
            })
            .await;

            let stored = match persisted {
                Ok(Ok(stored)) => stored,
                Ok(Err(e)) => {
                    warn!("{} message to room {} not persisted: {}", username, room, e);
                    return;
                }
                Err(e) => {
                    warn!("spawn_blocking join error: {}", e);
                    return;
                }
            };

            dispatcher
                .broadcast(
                    room,
                    GatewayEvent::ReceiveMessage(RoomEvent {
                        username: username.to_string(),
                        message,
                        room,
                        created_at: format_timestamp(stored.created_at),
                    }),
                )
                .await;
        }
    }
}

/// Truncates a raw frame for logging without splitting a multi-byte
/// character.
fn log_snippet(text: &str) -> &str {
    const MAX: usize = 200;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::log_snippet;

    #[test]
    fn log_snippet_backs_off_to_a_char_boundary() {
        // A two-byte character straddling the cutoff must not panic the
        // slice; the snippet stops just before it.
        let mut text = "a".repeat(199);
        text.push('é');
        text.push_str(&"b".repeat(20));
        let snippet = log_snippet(&text);
        assert_eq!(snippet.len(), 199);
        assert!(text.starts_with(snippet));
    }

    #[test]
    fn log_snippet_keeps_short_frames_whole() {
        assert_eq!(log_snippet("join please"), "join please");
    }
}
