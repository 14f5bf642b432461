//! Message protocol definitions
//!
//! Inbound frames are free-form JSON objects: the relay forwards most of
//! them near-verbatim, so they are kept as a `serde_json` map and only the
//! fields a handler needs are validated. Outbound frames are either a
//! server notice envelope or a relayed peer frame.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::SignalError;
use crate::room::Room;
use crate::types::{ClientId, RoomId};

/// Relayed negotiation message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Offer,
    Answer,
    Candidate,
    Message,
}

/// Recognized values of an inbound frame's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Forward an offer (sdp + candidate) to a peer
    Connect,
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    EndRoom,
    /// Generic peer-to-peer relay
    Relay(RelayKind),
}

impl RequestKind {
    /// Classify a `type` value; `None` for anything unrecognized
    pub fn from_type(value: &str) -> Option<Self> {
        let kind = match value {
            "connect" => Self::Connect,
            "create_room" => Self::CreateRoom,
            "join_room" => Self::JoinRoom,
            "leave_room" => Self::LeaveRoom,
            "end_room" => Self::EndRoom,
            "offer" => Self::Relay(RelayKind::Offer),
            "answer" => Self::Relay(RelayKind::Answer),
            "candidate" => Self::Relay(RelayKind::Candidate),
            "message" => Self::Relay(RelayKind::Message),
            _ => return None,
        };
        Some(kind)
    }
}

/// Client → Server frame
#[derive(Debug, Clone, PartialEq)]
pub struct ClientFrame {
    fields: Map<String, Value>,
}

impl ClientFrame {
    /// Parse a text frame. Anything other than a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let fields = serde_json::from_str::<Map<String, Value>>(text)?;
        Ok(Self { fields })
    }

    /// The frame's request kind, if its `type` is a recognized string
    pub fn kind(&self) -> Option<RequestKind> {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .and_then(RequestKind::from_type)
    }

    /// Raw `type` value, for logging
    pub fn type_name(&self) -> &str {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<none>")
    }

    /// Target client id from `to`
    pub fn target(&self) -> Result<&str, SignalError> {
        self.fields
            .get("to")
            .and_then(Value::as_str)
            .ok_or(SignalError::MissingFields("'to' field not found"))
    }

    /// The `data` payload, which must be an object
    pub fn data(&self) -> Result<&Map<String, Value>, SignalError> {
        self.fields
            .get("data")
            .and_then(Value::as_object)
            .ok_or(SignalError::MissingFields(
                "'data' field is missing or is not object in the request.",
            ))
    }

    /// The `data` payload when it may be omitted entirely
    pub fn optional_data(&self) -> Result<Option<&Map<String, Value>>, SignalError> {
        match self.fields.get("data") {
            None => Ok(None),
            Some(_) => self.data().map(Some),
        }
    }

    /// Room id from `data.room`
    pub fn room_id(&self) -> Result<&str, SignalError> {
        self.data()?
            .get("room")
            .and_then(Value::as_str)
            .ok_or(SignalError::MissingFields(
                "'room' field is missing in the request.",
            ))
    }

    /// Rewrite this frame for delivery: drop `to`, stamp `from`
    pub fn into_relay(mut self, from: &ClientId) -> Map<String, Value> {
        self.fields.remove("to");
        self.fields
            .insert("from".to_string(), Value::String(from.to_string()));
        self.fields
    }
}

/// Envelope type for server notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Update,
    Error,
    Info,
}

/// Room membership events pushed to every member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    ClientAdded,
    ClientRemoved,
    RoomDeleted,
}

impl RoomEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomEvent::ClientAdded => "client_added",
            RoomEvent::ClientRemoved => "client_removed",
            RoomEvent::RoomDeleted => "room_deleted",
        }
    }
}

/// Server-generated frame
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    /// Event label (or error title)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub event: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub message_id: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, event: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            event: event.into(),
            data,
            timestamp: Utc::now(),
            message_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Server → Client message
///
/// Notices are serialized as the envelope; relayed frames go out exactly
/// as rewritten by [`ClientFrame::into_relay`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Notice(Notice),
    Relay(Map<String, Value>),
}

impl ServerMessage {
    /// Greeting sent right after registration
    pub fn client_details(id: &ClientId) -> Self {
        Self::Notice(Notice::new(
            NoticeKind::Info,
            "client_details",
            json!({ "id": id }),
        ))
    }

    /// Reply to a successful `create_room`
    pub fn room_created(room: &Room) -> Self {
        Self::Notice(Notice::new(
            NoticeKind::Info,
            "room_created",
            room_snapshot(room),
        ))
    }

    /// Membership update fanned out to room members
    pub fn room_update(event: RoomEvent, room: &Room) -> Self {
        Self::Notice(Notice::new(
            NoticeKind::Update,
            event.as_str(),
            room_snapshot(room),
        ))
    }

    /// Reply to a successful `leave_room`
    pub fn room_left(room_id: &RoomId) -> Self {
        Self::Notice(Notice::new(
            NoticeKind::Info,
            "room_left",
            json!({ "room": room_id }),
        ))
    }

    /// Offer forwarded on behalf of a `connect` request
    pub fn offer(from: &ClientId, sdp: Value, candidate: Value) -> Self {
        Self::Notice(Notice::new(
            NoticeKind::Info,
            "offer",
            json!({
                "type": "offer",
                "from": from,
                "data": { "sdp": sdp, "candidate": candidate },
            }),
        ))
    }
}

/// Convert SignalError to ServerMessage for client notification
impl From<SignalError> for ServerMessage {
    fn from(err: SignalError) -> Self {
        Self::Notice(Notice::new(
            NoticeKind::Error,
            err.title(),
            json!({ "message": err.to_string() }),
        ))
    }
}

fn room_snapshot(room: &Room) -> Value {
    json!({
        "clients": room.members(),
        "room": room.id,
        "name": room.name,
    })
}
