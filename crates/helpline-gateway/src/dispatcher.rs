use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use helpline_types::events::GatewayEvent;

/// Manages room subscriber sets and delivers events to joined connections.
///
/// Membership here is session-scoped: a connection only receives events for
/// rooms it explicitly joined, regardless of what the Room Directory says.
/// Delivery is at-most-once and best-effort — the message store remains the
/// durable source of truth, so reconnecting clients re-fetch history.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All live connections: conn_id -> delivery channel
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>,

    /// Subscriber sets: room_id -> (conn_id -> delivery channel)
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection. Returns (conn_id, receiver); the receiver
    /// is the connection's delivery channel and closes on `disconnect`.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Add the connection to a room's subscriber set. Idempotent.
    pub async fn join(&self, conn_id: Uuid, room: Uuid) {
        // Hold the connections lock across the insert so a concurrent
        // `disconnect` cannot scrub the room between the liveness check and
        // the insert and leave a dead subscriber behind. Lock order
        // (connections, then rooms) matches `disconnect`.
        let connections = self.inner.connections.read().await;
        let Some(tx) = connections.get(&conn_id) else {
            return; // already disconnected
        };
        self.inner
            .rooms
            .write()
            .await
            .entry(room)
            .or_default()
            .insert(conn_id, tx.clone());
    }

    /// Remove the connection from a room's subscriber set. Idempotent.
    pub async fn leave(&self, conn_id: Uuid, room: Uuid) {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(subscribers) = rooms.get_mut(&room) {
            subscribers.remove(&conn_id);
            if subscribers.is_empty() {
                rooms.remove(&room);
            }
        }
    }

    /// Deliver an event to every connection currently joined to the room.
    pub async fn broadcast(&self, room: Uuid, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().await;
        if let Some(subscribers) = rooms.get(&room) {
            for tx in subscribers.values() {
                // A closed channel means the connection is going away; its
                // disconnect cleanup will remove the entry.
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Remove the connection from the registry and from every room it
    /// joined. Mandatory on disconnect, or dead entries would accumulate.
    pub async fn disconnect(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);

        let mut rooms = self.inner.rooms.write().await;
        rooms.retain(|_, subscribers| {
            subscribers.remove(&conn_id);
            !subscribers.is_empty()
        });
    }

    /// Number of connections currently joined to a room.
    pub async fn room_size(&self, room: Uuid) -> usize {
        self.inner
            .rooms
            .read()
            .await
            .get(&room)
            .map_or(0, |s| s.len())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_types::events::RoomEvent;

    fn event(room: Uuid, message: &str) -> GatewayEvent {
        GatewayEvent::ReceiveMessage(RoomEvent {
            username: "alice".into(),
            message: message.into(),
            room,
            created_at: "05 Jan, 14:32".into(),
        })
    }

    #[tokio::test]
    async fn broadcast_reaches_joined_connections_only() {
        let dispatcher = Dispatcher::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        let (conn1, mut rx1) = dispatcher.register().await;
        let (conn2, mut rx2) = dispatcher.register().await;
        dispatcher.join(conn1, room_a).await;
        dispatcher.join(conn2, room_b).await;

        dispatcher.broadcast(room_a, event(room_a, "hi")).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();

        let (conn, mut rx) = dispatcher.register().await;
        dispatcher.join(conn, room).await;
        dispatcher.join(conn, room).await;
        assert_eq!(dispatcher.room_size(room).await, 1);

        dispatcher.broadcast(room, event(room, "once")).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();

        let (conn, mut rx) = dispatcher.register().await;
        dispatcher.join(conn, room).await;
        dispatcher.leave(conn, room).await;
        dispatcher.leave(conn, room).await; // second leave is a no-op

        dispatcher.broadcast(room, event(room, "gone")).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.room_size(room).await, 0);
    }

    #[tokio::test]
    async fn disconnect_cleans_every_joined_room() {
        let dispatcher = Dispatcher::new();
        let room_a = Uuid::new_v4();
        let room_b = Uuid::new_v4();

        let (conn, mut rx) = dispatcher.register().await;
        dispatcher.join(conn, room_a).await;
        dispatcher.join(conn, room_b).await;

        dispatcher.disconnect(conn).await;

        dispatcher.broadcast(room_a, event(room_a, "late")).await;
        dispatcher.broadcast(room_b, event(room_b, "late")).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.room_size(room_a).await, 0);
        assert_eq!(dispatcher.room_size(room_b).await, 0);

        // Joining after disconnect is a no-op
        dispatcher.join(conn, room_a).await;
        assert_eq!(dispatcher.room_size(room_a).await, 0);
    }

    #[tokio::test]
    async fn racing_join_and_disconnect_leaves_no_subscriber() {
        // Whichever way a concurrent join and disconnect interleave, a
        // disconnected connection must not stay in the room's subscriber
        // set. Repeat to cover both orderings.
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();

        for _ in 0..100 {
            let (conn, _rx) = dispatcher.register().await;
            let joiner = dispatcher.clone();
            let closer = dispatcher.clone();
            let join = tokio::spawn(async move { joiner.join(conn, room).await });
            let close = tokio::spawn(async move { closer.disconnect(conn).await });
            join.await.unwrap();
            close.await.unwrap();

            assert_eq!(dispatcher.room_size(room).await, 0);
        }
    }
}
