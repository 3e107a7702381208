//! In-memory room membership. A room exists exactly while it has members;
//! there is no persistence, clients rejoin after a restart.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{chat::protocol::ServerEvent, users::SafeUser};

/// One live connection as seen from inside a room: the profile bound at
/// connect time plus the handle used to push outbound events to it.
#[derive(Clone)]
pub struct Member {
    pub user: SafeUser,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

struct Room {
    members: HashMap<Uuid, Member>,
    // Held across persist+broadcast so that, within one room, broadcast
    // order equals persistence order.
    send_gate: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<String, Room>,
    room_of: HashMap<Uuid, String>,
}

/// Sole owner of the connection<->room relationship, kept as two
/// one-directional maps behind one lock so join/leave/members are
/// linearizable. The lock is never held across an await point.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl RoomRegistry {
    /// Adds a connection to a room, creating the room on first join. A
    /// connection already elsewhere leaves its old room first.
    pub fn join(&self, conn_id: Uuid, room_id: &str, member: Member) {
        let mut inner = self.inner.lock().unwrap();
        remove_conn(&mut inner, conn_id);

        inner
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| Room {
                members: HashMap::new(),
                send_gate: Arc::new(tokio::sync::Mutex::new(())),
            })
            .members
            .insert(conn_id, member);
        inner.room_of.insert(conn_id, room_id.to_owned());
    }

    /// Removes a connection from whatever room it occupies; dropping the
    /// last member discards the room entry. Absence == closed.
    pub fn leave(&self, conn_id: Uuid) -> Option<String> {
        remove_conn(&mut self.inner.lock().unwrap(), conn_id)
    }

    /// Consistent snapshot of a room's membership at the instant of the
    /// call; empty if the room does not exist.
    pub fn members(&self, room_id: &str) -> Vec<Member> {
        let inner = self.inner.lock().unwrap();
        inner
            .rooms
            .get(room_id)
            .map(|room| room.members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The room a connection is bound to plus its member record, if any.
    pub fn binding(&self, conn_id: Uuid) -> Option<(String, Member)> {
        let inner = self.inner.lock().unwrap();
        let room_id = inner.room_of.get(&conn_id)?;
        let member = inner.rooms.get(room_id)?.members.get(&conn_id)?;
        Some((room_id.clone(), member.clone()))
    }

    pub fn send_gate(&self, room_id: &str) -> Option<Arc<tokio::sync::Mutex<()>>> {
        let inner = self.inner.lock().unwrap();
        inner.rooms.get(room_id).map(|room| room.send_gate.clone())
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().unwrap().rooms.len()
    }
}

fn remove_conn(inner: &mut Inner, conn_id: Uuid) -> Option<String> {
    let room_id = inner.room_of.remove(&conn_id)?;
    if let Some(room) = inner.rooms.get_mut(&room_id) {
        room.members.remove(&conn_id);
        if room.members.is_empty() {
            inner.rooms.remove(&room_id);
        }
    }
    Some(room_id)
}
