use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bson::oid::ObjectId;
use dashmap::DashMap;
use futures::stream::SplitSink;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Registry specialized to live sockets; the generic parameter exists
/// so tests can drive the bookkeeping without a WebSocket.
pub type WsRegistry = ConnectionRegistry<WsSender>;

struct ConnEntry<S> {
    user_id: ObjectId,
    sender: S,
    rooms: HashSet<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// This connection had already joined the room.
    pub rejoined: bool,
    /// No other connection of this identity was in the room; the
    /// caller must register the participant and broadcast the join.
    pub first_for_user: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// False when this connection never joined the room (idempotent
    /// leave: no error, no broadcast).
    pub was_joined: bool,
    /// This was the identity's last live connection in the room; the
    /// caller must remove the participant and broadcast the leave.
    pub last_for_user: bool,
}

pub struct DroppedConnection<S> {
    pub user_id: ObjectId,
    pub sender: S,
    /// Every room the connection had joined, with the last-connection
    /// flag per the same rule as an explicit leave.
    pub rooms: Vec<(ObjectId, bool)>,
}

/// Tracks live connections per identity and room joins per
/// connection. One identity may hold N simultaneous connections
/// (tabs, devices); room presence is an identity-level fact, so the
/// first/last connection transitions are what the dispatcher acts on.
///
/// This index is per-process; the cross-process participant set lives
/// in the shared store.
pub struct ConnectionRegistry<S> {
    /// user_id -> conn_id -> sender, for identity-targeted delivery.
    users: DashMap<ObjectId, HashMap<String, S>>,
    connections: DashMap<String, ConnEntry<S>>,
    /// room -> conn ids currently joined, for fan-out.
    room_conns: DashMap<ObjectId, HashSet<String>>,
    /// room -> user -> live connection count.
    room_users: DashMap<ObjectId, HashMap<ObjectId, usize>>,
}

impl<S: Clone> ConnectionRegistry<S> {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            connections: DashMap::new(),
            room_conns: DashMap::new(),
            room_users: DashMap::new(),
        }
    }

    pub fn add(&self, user_id: ObjectId, connection_id: String, sender: S) {
        self.users
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone(), sender.clone());
        self.connections.insert(
            connection_id,
            ConnEntry {
                user_id,
                sender,
                rooms: HashSet::new(),
            },
        );
    }

    pub fn join_room(&self, connection_id: &str, room_id: ObjectId) -> Option<JoinOutcome> {
        let user_id;
        {
            let mut entry = self.connections.get_mut(connection_id)?;
            user_id = entry.user_id;
            if !entry.rooms.insert(room_id) {
                return Some(JoinOutcome {
                    rejoined: true,
                    first_for_user: false,
                });
            }
        }

        self.room_conns
            .entry(room_id)
            .or_default()
            .insert(connection_id.to_string());

        let mut users = self.room_users.entry(room_id).or_default();
        let count = users.entry(user_id).or_insert(0);
        *count += 1;
        Some(JoinOutcome {
            rejoined: false,
            first_for_user: *count == 1,
        })
    }

    pub fn leave_room(&self, connection_id: &str, room_id: ObjectId) -> LeaveOutcome {
        let user_id;
        {
            let Some(mut entry) = self.connections.get_mut(connection_id) else {
                return LeaveOutcome {
                    was_joined: false,
                    last_for_user: false,
                };
            };
            user_id = entry.user_id;
            if !entry.rooms.remove(&room_id) {
                return LeaveOutcome {
                    was_joined: false,
                    last_for_user: false,
                };
            }
        }

        self.detach_from_room(connection_id, user_id, room_id)
    }

    fn detach_from_room(
        &self,
        connection_id: &str,
        user_id: ObjectId,
        room_id: ObjectId,
    ) -> LeaveOutcome {
        if let Some(mut conns) = self.room_conns.get_mut(&room_id) {
            conns.remove(connection_id);
            if conns.is_empty() {
                drop(conns);
                self.room_conns.remove(&room_id);
            }
        }

        let mut last_for_user = false;
        if let Some(mut users) = self.room_users.get_mut(&room_id) {
            if let Some(count) = users.get_mut(&user_id) {
                *count -= 1;
                if *count == 0 {
                    users.remove(&user_id);
                    last_for_user = true;
                }
            }
            if users.is_empty() {
                drop(users);
                self.room_users.remove(&room_id);
            }
        }

        LeaveOutcome {
            was_joined: true,
            last_for_user,
        }
    }

    /// Deregisters the connection entirely; an abrupt disconnect is an
    /// implicit leave for every room it had joined.
    pub fn drop_connection(&self, connection_id: &str) -> Option<DroppedConnection<S>> {
        let (_, entry) = self.connections.remove(connection_id)?;

        if let Some(mut senders) = self.users.get_mut(&entry.user_id) {
            senders.remove(connection_id);
            if senders.is_empty() {
                drop(senders);
                self.users.remove(&entry.user_id);
            }
        }

        let rooms = entry
            .rooms
            .iter()
            .map(|room_id| {
                let outcome = self.detach_from_room(connection_id, entry.user_id, *room_id);
                (*room_id, outcome.last_for_user)
            })
            .collect();

        Some(DroppedConnection {
            user_id: entry.user_id,
            sender: entry.sender,
            rooms,
        })
    }

    /// Senders of every connection joined to the room, minus the one
    /// to exclude (no self-echo on fan-out).
    pub fn room_senders(&self, room_id: &ObjectId, except: Option<&str>) -> Vec<S> {
        let Some(conns) = self.room_conns.get(room_id) else {
            return Vec::new();
        };
        conns
            .iter()
            .filter(|conn_id| except != Some(conn_id.as_str()))
            .filter_map(|conn_id| self.connections.get(conn_id).map(|e| e.sender.clone()))
            .collect()
    }

    /// All of an identity's connections, for targeted delivery.
    pub fn user_senders(&self, user_id: &ObjectId) -> Vec<S> {
        self.users
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_joined(&self, connection_id: &str, room_id: &ObjectId) -> bool {
        self.connections
            .get(connection_id)
            .map(|e| e.rooms.contains(room_id))
            .unwrap_or(false)
    }

    pub fn sender_of(&self, connection_id: &str) -> Option<S> {
        self.connections.get(connection_id).map(|e| e.sender.clone())
    }

    /// Identities with at least one live connection in the room.
    pub fn room_user_count(&self, room_id: &ObjectId) -> usize {
        self.room_users.get(room_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the identity has at least one live connection joined to
    /// the room. Targeted delivery checks this before resolving the
    /// identity index, which spans every room.
    pub fn user_in_room(&self, room_id: &ObjectId, user_id: &ObjectId) -> bool {
        self.room_users
            .get(room_id)
            .map(|m| m.contains_key(user_id))
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Every live sender; used by shutdown to drain open sockets.
    pub fn all_senders(&self) -> Vec<S> {
        self.connections.iter().map(|e| e.sender.clone()).collect()
    }
}

impl<S: Clone> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
