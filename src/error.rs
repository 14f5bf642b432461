//! Error types for the signaling relay
//!
//! Defines fatal application errors, the client-visible signaling errors,
//! and outbound queue send errors. Uses thiserror for ergonomic error
//! definitions.

use thiserror::Error;

/// Application-level errors
///
/// These end a single connection (or the process, at startup). They are
/// never reported to clients.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Request validation errors
///
/// Always reported back to the requesting client as an `error` frame.
/// The display text becomes the frame's `data.message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Required key absent or of the wrong shape
    #[error("{0}")]
    MissingFields(&'static str),

    /// Target of a direct message is not connected
    #[error("Client with given {0} not found")]
    ClientNotFound(String),

    /// Referenced room does not exist
    #[error("Room with Id {0} does not exist.")]
    InvalidRoom(String),

    /// Room id already in use
    #[error("{0} already exist")]
    DuplicateRoom(String),

    /// Sender is already in the room
    #[error("Client already exists in the room.")]
    AlreadyMember,

    /// Sender is not in the room
    #[error("Client does not exists in the room.")]
    NotAMember,

    /// Only the creator may end a room
    #[error("You need to be creator of room to delete it.")]
    Unauthorized,
}

impl SignalError {
    /// Title carried in the `event` field of the error frame
    pub fn title(&self) -> &'static str {
        match self {
            SignalError::MissingFields(_) => "missing fields",
            SignalError::ClientNotFound(_) => "client missing",
            SignalError::InvalidRoom(_) => "invalid room",
            SignalError::DuplicateRoom(_) => "duplicate room",
            SignalError::AlreadyMember => "already exists",
            SignalError::NotAMember => "client not found",
            SignalError::Unauthorized => "unauthorised",
        }
    }
}

/// Message send errors
///
/// Occurs when pushing to a client's outbound queue fails.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client is not draining its queue fast enough
    #[error("Outbound queue full")]
    QueueFull,
}
