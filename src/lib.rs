//! WebRTC Signaling Relay Library
//!
//! A WebSocket coordinator that lets clients find each other and exchange
//! connection-negotiation payloads (offers, answers, ICE candidates)
//! without ever touching the resulting peer-to-peer traffic.
//!
//! # Features
//! - Opaque client ids issued on connect
//! - Rooms with a creator and ordered, duplicate-free membership
//! - Membership updates fanned out to every room member
//! - Verbatim relay of negotiation frames between named peers
//! - Disconnect cleanup, deleting rooms that become empty
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `SignalServer` is the central actor owning the client and room registries
//! - Each connection has a `handler` task forwarding parsed frames to it
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use signal_relay::{serve, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     serve(listener, config).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
mod router;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ClientRegistry};
pub use config::Config;
pub use error::{AppError, SendError, SignalError};
pub use handler::{handle_connection, serve};
pub use message::{ClientFrame, Notice, NoticeKind, RequestKind, RoomEvent, ServerMessage};
pub use room::{Room, RoomRegistry};
pub use server::{ServerCommand, SignalServer};
pub use types::{ClientId, RoomId};
