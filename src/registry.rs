//! Process-wide table of connections, users and rooms
//!
//! The registry is the only state shared between rooms. It maps every open
//! connection to its tunnel, every registered connection to its
//! [`UserInfo`], and every active room name to the handle of the task that
//! owns the room. All maps are concurrent; broadcasts take a snapshot of the
//! recipients first and send after every map guard has been released.

use std::collections::HashSet;

use dashmap::{DashMap, mapref::entry::Entry};
use derive_where::derive_where;
use enum_map::EnumMap;
use itertools::Itertools;

use crate::{
    driver::RoomHandle,
    protocol::{ActiveRooms, ActiveUsers, ClientMessage},
    session::Tunnel,
    watcher::{Id, Role, UserInfo},
};

/// Concurrent registry of sessions and rooms
#[derive_where(Default)]
pub struct Registry<T> {
    /// Every open connection
    connections: DashMap<Id, T>,
    /// Membership of every registered connection
    users: DashMap<Id, UserInfo>,
    /// Members of each room by role
    members: DashMap<String, EnumMap<Role, HashSet<Id>>>,
    /// Every active room
    rooms: DashMap<String, RoomHandle>,
}

impl<T: Tunnel> Registry<T> {
    /// Records a new connection and returns its ID
    pub fn join(&self, tunnel: T) -> Id {
        let id = Id::new();
        self.connections.insert(id, tunnel);
        id
    }

    /// Forgets a connection
    ///
    /// The user record, if any, is left for the caller to remove.
    pub fn leave(&self, id: Id) -> Option<T> {
        self.connections.remove(&id).map(|(_, tunnel)| tunnel)
    }

    /// The tunnel of a connection
    pub fn tunnel(&self, id: Id) -> Option<T> {
        self.connections.get(&id).map(|tunnel| tunnel.clone())
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Registers a connection as a member of a room
    ///
    /// A connection belongs to at most one room. If it is already
    /// registered, the existing record wins and is returned unchanged.
    pub fn register_user(&self, user: UserInfo) -> UserInfo {
        match self.users.entry(user.connection) {
            Entry::Occupied(existing) => {
                tracing::error!(
                    connection = %user.connection,
                    room = %existing.get().room,
                    requested = %user.room,
                    "connection is already registered"
                );
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                self.members
                    .entry(user.room.clone())
                    .or_default()
                    .value_mut()[user.role]
                    .insert(user.connection);
                user
            }
        }
    }

    /// The membership record of a connection
    pub fn lookup_user(&self, id: Id) -> Option<UserInfo> {
        self.users.get(&id).map(|user| user.clone())
    }

    /// Removes the membership record of a connection
    pub fn remove_user(&self, id: Id) -> Option<UserInfo> {
        let (_, user) = self.users.remove(&id)?;
        if let Entry::Occupied(mut members) = self.members.entry(user.room.clone()) {
            members.get_mut()[user.role].remove(&id);
            if members.get().values().all(HashSet::is_empty) {
                members.remove();
            }
        }
        Some(user)
    }

    fn member_ids(&self, room: &str, role: Option<Role>) -> Vec<Id> {
        self.members
            .get(room)
            .map(|members| match role {
                Some(role) => members[role].iter().copied().collect_vec(),
                None => members.values().flatten().copied().collect_vec(),
            })
            .unwrap_or_default()
    }

    /// Members of a room with their tunnels, optionally of one role only
    ///
    /// Members whose connection is already gone are skipped.
    pub fn sessions_for(&self, room: &str, role: Option<Role>) -> Vec<(Id, T)> {
        self.member_ids(room, role)
            .into_iter()
            .filter_map(|id| self.tunnel(id).map(|tunnel| (id, tunnel)))
            .collect_vec()
    }

    /// Membership records of everyone in a room
    pub fn users_in(&self, room: &str) -> Vec<UserInfo> {
        self.member_ids(room, None)
            .into_iter()
            .filter_map(|id| self.lookup_user(id))
            .collect_vec()
    }

    /// Whether any admin is registered to a room
    pub fn has_admin(&self, room: &str) -> bool {
        self.members
            .get(room)
            .is_some_and(|members| !members[Role::Admin].is_empty())
    }

    /// Number of admins and guests registered to a room
    pub fn active_users(&self, room: &str) -> ActiveUsers {
        self.members
            .get(room)
            .map(|members| ActiveUsers {
                admins: members[Role::Admin].len(),
                guests: members[Role::Guest].len(),
            })
            .unwrap_or_default()
    }

    /// Every open connection with its tunnel
    pub fn all_sessions(&self) -> Vec<(Id, T)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect_vec()
    }

    /// Adds a room unless one with the same name exists
    ///
    /// # Returns
    ///
    /// `true` if the room was added
    pub fn insert_room(&self, handle: RoomHandle) -> bool {
        match self.rooms.entry(handle.info().name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// The handle of a room
    pub fn room(&self, name: &str) -> Option<RoomHandle> {
        self.rooms.get(name).map(|handle| handle.clone())
    }

    /// Removes a room
    pub fn remove_room(&self, name: &str) -> Option<RoomHandle> {
        self.rooms.remove(name).map(|(_, handle)| handle)
    }

    /// Removes a room if `predicate` accepts its handle
    pub fn remove_room_if(
        &self,
        name: &str,
        predicate: impl FnOnce(&RoomHandle) -> bool,
    ) -> Option<RoomHandle> {
        self.rooms
            .remove_if(name, |_, handle| predicate(handle))
            .map(|(_, handle)| handle)
    }

    /// Names of every active room in sorted order
    pub fn room_names(&self) -> Vec<String> {
        self.rooms
            .iter()
            .map(|entry| entry.key().clone())
            .sorted()
            .collect_vec()
    }

    /// The active room list as a message
    pub fn active_rooms(&self) -> ClientMessage {
        ClientMessage::ActiveRooms(ActiveRooms {
            rooms: self.room_names(),
        })
    }

    /// Sends a message to one connection
    pub fn send(&self, id: Id, message: &ClientMessage) {
        match self.tunnel(id) {
            Some(tunnel) => tunnel.send_message(message),
            None => tracing::debug!(connection = %id, "message to closed connection dropped"),
        }
    }

    /// Sends a message to the members of a room, optionally of one role only
    pub fn announce(&self, room: &str, role: Option<Role>, message: &ClientMessage) {
        let text = message.to_message();
        for (_, tunnel) in self.sessions_for(room, role) {
            tunnel.deliver(&text);
        }
    }

    /// Sends a message to every open connection
    pub fn announce_all(&self, message: &ClientMessage) {
        let text = message.to_message();
        for (_, tunnel) in self.all_sessions() {
            tunnel.deliver(&text);
        }
    }

    /// Drops every connection, user and room
    pub fn clear(&self) {
        for entry in &self.rooms {
            entry.value().close();
        }
        self.rooms.clear();
        self.members.clear();
        self.users.clear();
        self.connections.clear();
    }
}
