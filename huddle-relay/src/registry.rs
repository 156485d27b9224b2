//! Connection registry for the relay server.
//!
//! Tracks every live connection, the opaque identity assigned to it at
//! connect time, and which rooms it currently belongs to. Rooms are implicit:
//! an entry exists in the index exactly as long as it has members, so a room
//! comes into being on first join and vanishes when its last member leaves.
//!
//! The registry is an owned instance (no process-wide singleton); the
//! dispatcher holds one inside its shared state and tests can hold as many
//! independent instances as they like.

use std::collections::{HashMap, HashSet};

use axum::extract::ws::Message;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// All registry state lives behind one lock: the membership invariants
/// (a connection's room set mirrors the rooms' member sets, and both only
/// reference live connections) span the three maps, so they are only ever
/// mutated under a single write guard.
#[derive(Default)]
struct RegistryInner {
    /// Connection id to the sender half of its outbound message channel.
    connections: HashMap<String, mpsc::UnboundedSender<Message>>,
    /// Room name to member connection ids. No entry for empty rooms.
    rooms: HashMap<String, HashSet<String>>,
    /// Connection id to the rooms it has joined.
    joined: HashMap<String, HashSet<String>>,
}

/// In-memory index of live connections and room membership.
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Registers a newly connected session and returns its identity.
    ///
    /// Identities are UUIDv7 strings, unique for the lifetime of the process
    /// and never reused. The connection starts with no room memberships.
    pub async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> String {
        let connection_id = Uuid::now_v7().to_string();
        let mut inner = self.inner.write().await;
        inner.connections.insert(connection_id.clone(), sender);
        drop(inner);
        connection_id
    }

    /// Returns a clone of the outbound sender for a connection, if it is live.
    pub async fn sender(&self, connection_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        let inner = self.inner.read().await;
        inner.connections.get(connection_id).cloned()
    }

    /// Adds a connection to a room, creating the room entry if absent.
    ///
    /// Returns `true` if membership changed, `false` for a duplicate join or
    /// an unknown connection id. Callers are expected to pass ids obtained
    /// from [`ConnectionRegistry::register`]; an unknown id is a no-op rather
    /// than an error.
    pub async fn join(&self, connection_id: &str, room_id: &str) -> bool {
        let mut inner = self.inner.write().await;

        if !inner.connections.contains_key(connection_id) {
            tracing::warn!(
                connection_id = %connection_id,
                room = %room_id,
                "join from unknown connection ignored"
            );
            return false;
        }

        let newly_joined = inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
        inner
            .joined
            .entry(connection_id.to_string())
            .or_default()
            .insert(room_id.to_string());
        drop(inner);

        newly_joined
    }

    /// Returns the current member ids of a room; empty if the room does not
    /// exist. Never an error.
    pub async fn members(&self, room_id: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the outbound senders for a room's members in one pass,
    /// optionally excluding a single connection (the event's sender).
    pub async fn room_senders(
        &self,
        room_id: &str,
        exclude: Option<&str>,
    ) -> Vec<mpsc::UnboundedSender<Message>> {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|id| exclude != Some(id.as_str()))
            .filter_map(|id| inner.connections.get(id).cloned())
            .collect()
    }

    /// Removes a connection from every room it belonged to and discards its
    /// identity, returning the sender if the connection was live.
    ///
    /// Rooms emptied by the removal are deleted from the index so they never
    /// block future joins or leak memory.
    pub async fn unregister(&self, connection_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        let mut inner = self.inner.write().await;
        if let Some(rooms) = inner.joined.remove(connection_id) {
            for room_id in rooms {
                if let Some(members) = inner.rooms.get_mut(&room_id) {
                    members.remove(connection_id);
                    if members.is_empty() {
                        inner.rooms.remove(&room_id);
                    }
                }
            }
        }
        inner.connections.remove(connection_id)
    }

    /// Sends a WebSocket Close frame to every live connection.
    ///
    /// Each connection's writer task forwards the frame and the client-side
    /// reader observes the disconnect. Used for graceful shutdown and tests.
    pub async fn close_all(&self) {
        let inner = self.inner.read().await;
        for (connection_id, sender) in &inner.connections {
            tracing::info!(connection_id = %connection_id, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}
