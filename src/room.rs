//! Room and room registry
//!
//! A room is a named group of client ids with one creator. Membership is
//! only ever changed through [`RoomRegistry`], which also deletes a room
//! as soon as its last member leaves.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::SignalError;
use crate::types::{ClientId, RoomId};

/// Signaling room
#[derive(Debug)]
pub struct Room {
    /// Room id
    pub id: RoomId,
    /// Human-readable label (empty when not given)
    pub name: String,
    /// Client that created the room; only it may end the room
    pub creator: ClientId,
    /// Members in join order, no duplicates
    members: Vec<ClientId>,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create a new room whose only member is its creator
    pub fn new(id: RoomId, name: String, creator: ClientId) -> Self {
        Self {
            id,
            name,
            members: vec![creator.clone()],
            creator,
            created_at: Instant::now(),
        }
    }

    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: &str) -> bool {
        self.members.iter().any(|m| m == client_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn add_member(&mut self, client_id: &ClientId) -> Result<(), SignalError> {
        if self.contains(client_id.as_str()) {
            return Err(SignalError::AlreadyMember);
        }
        self.members.push(client_id.clone());
        Ok(())
    }

    /// Returns the number of members left
    fn remove_member(&mut self, client_id: &str) -> Result<usize, SignalError> {
        let index = self
            .members
            .iter()
            .position(|m| m == client_id)
            .ok_or(SignalError::NotAMember)?;
        self.members.remove(index);
        Ok(self.members.len())
    }
}

/// All active rooms: RoomId -> Room
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room, generating an id when none is given
    ///
    /// Fails without touching the registry if the requested id is taken.
    pub fn create(
        &mut self,
        id: Option<&str>,
        name: Option<&str>,
        creator: &ClientId,
    ) -> Result<&Room, SignalError> {
        let id = match id {
            Some(id) if self.rooms.contains_key(id) => {
                return Err(SignalError::DuplicateRoom(id.to_string()));
            }
            Some(id) => RoomId::from(id),
            None => loop {
                let id = RoomId::generate();
                if !self.rooms.contains_key(&id) {
                    break id;
                }
            },
        };

        info!("Client {} created room {}", creator, id);
        let room = Room::new(id.clone(), name.unwrap_or_default().to_string(), creator.clone());
        Ok(&*self.rooms.entry(id).or_insert(room))
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Append a client to a room's members
    pub fn add_member(&mut self, room_id: &str, client_id: &ClientId) -> Result<&Room, SignalError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SignalError::InvalidRoom(room_id.to_string()))?;
        room.add_member(client_id)?;
        info!("Client {} joined room {}", client_id, room_id);
        Ok(&*room)
    }

    /// Remove a client from one room
    ///
    /// Returns the number of members left. A room left empty is deleted
    /// before returning.
    pub fn remove_member(&mut self, room_id: &str, client_id: &str) -> Result<usize, SignalError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SignalError::InvalidRoom(room_id.to_string()))?;
        let remaining = room.remove_member(client_id)?;
        info!("Client {} left room {}", client_id, room_id);

        if remaining == 0 {
            self.rooms.remove(room_id);
            info!("Room {} deleted (empty)", room_id);
        }
        Ok(remaining)
    }

    /// Remove a client from every room it is in
    ///
    /// Returns the ids of affected rooms that still exist afterwards.
    pub fn remove_from_all(&mut self, client_id: &str) -> Vec<RoomId> {
        let joined: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|room| room.contains(client_id))
            .map(|room| room.id.clone())
            .collect();

        debug!("Client {} is in {} room(s)", client_id, joined.len());

        joined
            .into_iter()
            .filter(|room_id| matches!(self.remove_member(room_id.as_str(), client_id), Ok(n) if n > 0))
            .collect()
    }

    /// End a room on behalf of `requester`
    ///
    /// Only the creator may end a room, whether or not it is still a
    /// member. Returns the removed room.
    pub fn end(&mut self, room_id: &str, requester: &str) -> Result<Room, SignalError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| SignalError::InvalidRoom(room_id.to_string()))?;
        if room.creator != *requester {
            return Err(SignalError::Unauthorized);
        }
        self.delete(room_id)
            .ok_or_else(|| SignalError::InvalidRoom(room_id.to_string()))
    }

    /// Unconditionally remove a room; unknown ids are a no-op
    pub fn delete(&mut self, room_id: &str) -> Option<Room> {
        let room = self.rooms.remove(room_id);
        if room.is_some() {
            info!("Room {} deleted", room_id);
        }
        room
    }

    /// Change a room's display name
    pub fn rename(&mut self, room_id: &str, name: &str) -> Result<(), SignalError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SignalError::InvalidRoom(room_id.to_string()))?;
        room.name = name.to_string();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
