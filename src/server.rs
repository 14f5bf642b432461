//! SignalServer Actor implementation
//!
//! The central actor that owns both registries. Connection handlers never
//! touch shared state directly; they send `ServerCommand`s over a bounded
//! channel and the actor applies them one at a time, so every check and
//! the mutation that depends on it happen in a single uninterrupted step.
//!
//! Outbound sends use each client's bounded queue without waiting, so a
//! stalled peer can never hold up the actor.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::ClientRegistry;
use crate::error::SendError;
use crate::message::{ClientFrame, RoomEvent, ServerMessage};
use crate::room::{Room, RoomRegistry};
use crate::types::ClientId;

/// Commands sent from handlers to the SignalServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New channel opened; the assigned id is sent back on `respond_to`
    Connect {
        sender: mpsc::Sender<ServerMessage>,
        respond_to: oneshot::Sender<ClientId>,
    },
    /// Channel closed
    Disconnect { client_id: ClientId },
    /// Parsed inbound frame from a client
    Frame {
        client_id: ClientId,
        frame: ClientFrame,
    },
}

/// The main SignalServer actor
pub struct SignalServer {
    pub(crate) clients: ClientRegistry,
    pub(crate) rooms: RoomRegistry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl SignalServer {
    /// Create a new SignalServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            clients: ClientRegistry::new(),
            rooms: RoomRegistry::new(),
            receiver,
        }
    }

    /// Run the SignalServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("SignalServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("SignalServer shutting down");
    }

    /// Process a single command
    pub(crate) fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { sender, respond_to } => {
                self.handle_connect(sender, respond_to);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(&client_id);
            }
            ServerCommand::Frame { client_id, frame } => {
                self.dispatch(&client_id, frame);
            }
        }
    }

    /// Handle new client connection
    fn handle_connect(
        &mut self,
        sender: mpsc::Sender<ServerMessage>,
        respond_to: oneshot::Sender<ClientId>,
    ) {
        let client_id = self.clients.register(sender);
        info!("Client {} registered", client_id);

        self.reply(client_id.as_str(), ServerMessage::client_details(&client_id));

        if respond_to.send(client_id.clone()).is_err() {
            // Handler went away before learning its id
            self.handle_disconnect(&client_id);
            return;
        }
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Handle client disconnection
    ///
    /// Uses the same membership primitive as `leave_room`, then drops the
    /// client itself.
    fn handle_disconnect(&mut self, client_id: &ClientId) {
        info!("Client {} disconnected", client_id);

        for room_id in self.rooms.remove_from_all(client_id.as_str()) {
            self.notify_room(room_id.as_str(), RoomEvent::ClientRemoved);
        }

        self.clients.remove(client_id.as_str());

        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Send a message to one client, logging (not failing) on error
    pub(crate) fn reply(&self, client_id: &str, msg: ServerMessage) {
        let Some(client) = self.clients.get(client_id) else {
            debug!("Client {} not registered, dropping message", client_id);
            return;
        };
        match client.send(msg) {
            Ok(()) => {}
            Err(SendError::QueueFull) => {
                warn!("Outbound queue full for {}, dropping message", client_id);
            }
            Err(SendError::ChannelClosed) => {
                debug!("Channel closed for {}, dropping message", client_id);
            }
        }
    }

    /// Push a room update to every current member of a room
    pub(crate) fn notify_room(&self, room_id: &str, event: RoomEvent) {
        let Some(room) = self.rooms.get(room_id) else {
            debug!("Room {} not found, skipping {}", room_id, event.as_str());
            return;
        };
        self.fan_out(room, event);
    }

    /// Push a room update to the members of `room`
    ///
    /// Members that already disconnected are skipped.
    pub(crate) fn fan_out(&self, room: &Room, event: RoomEvent) {
        let msg = ServerMessage::room_update(event, room);
        for member in room.members() {
            if self.clients.contains(member.as_str()) {
                self.reply(member.as_str(), msg.clone());
            }
        }
    }
}
