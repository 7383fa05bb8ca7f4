use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::realtime::events::ServerEvent;

#[derive(Default)]
struct HubState {
    // connection id -> user id
    sessions: HashMap<Uuid, i64>,
    // user id -> live connections of that user
    rooms: HashMap<i64, HashMap<Uuid, UnboundedSender<ServerEvent>>>,
}

/// Registry of live WebSocket connections for this process.
#[derive(Clone, Default)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `user_id`'s room; the receiver yields every event routed to that user.
    pub async fn register(&self, user_id: i64) -> (Uuid, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();

        let mut state = self.state.lock().await;
        state.sessions.insert(conn_id, user_id);
        state.rooms.entry(user_id).or_default().insert(conn_id, tx);

        (conn_id, rx)
    }

    /// Forget a connection; returns the user it belonged to.
    pub async fn unregister(&self, conn_id: Uuid) -> Option<i64> {
        let mut state = self.state.lock().await;
        let user_id = state.sessions.remove(&conn_id)?;

        if let Some(room) = state.rooms.get_mut(&user_id) {
            room.remove(&conn_id);
            if room.is_empty() {
                state.rooms.remove(&user_id);
            }
        }

        Some(user_id)
    }

    /// Push an event to every connection of `user_id`. Offline users are a no-op.
    /// Returns the number of connections reached.
    pub async fn emit_to_user(&self, user_id: i64, event: ServerEvent) -> usize {
        let state = self.state.lock().await;
        let Some(room) = state.rooms.get(&user_id) else {
            return 0;
        };

        room.values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Push an event to a single connection.
    pub async fn emit_to_connection(&self, conn_id: Uuid, event: ServerEvent) -> bool {
        let state = self.state.lock().await;
        state
            .sessions
            .get(&conn_id)
            .and_then(|user_id| state.rooms.get(user_id))
            .and_then(|room| room.get(&conn_id))
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    #[cfg(test)]
    pub async fn is_connected(&self, user_id: i64) -> bool {
        self.state.lock().await.rooms.contains_key(&user_id)
    }

    /// Live sockets across all users.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}
