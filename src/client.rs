//! Client and client registry
//!
//! A client is an id bound to the sending half of its outbound queue.
//! The registry is a flat identity store with no room knowledge.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Connected client information
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Server → Client message channel
    sender: mpsc::Sender<ServerMessage>,
}

impl Client {
    /// Create a new client with the given ID and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, sender }
    }

    /// Queue a message for this client
    ///
    /// Never waits: a full queue means the peer is stalled, and the
    /// message is rejected rather than holding up the caller.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// All registered clients: ClientId -> Client
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under a fresh id and return the id
    pub fn register(&mut self, sender: mpsc::Sender<ServerMessage>) -> ClientId {
        let id = loop {
            let id = ClientId::generate();
            if !self.clients.contains_key(&id) {
                break id;
            }
        };
        self.clients.insert(id.clone(), Client::new(id.clone(), sender));
        id
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Remove a client; unknown ids are a no-op
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
