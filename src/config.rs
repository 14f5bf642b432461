//! Server configuration
//!
//! Every setting has a default and can be overridden through a
//! `SIGNAL_RELAY_*` environment variable. The bind address can also be
//! given as the first command line argument (see `main.rs`).

use crate::error::AppError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default capacity of the SignalServer command channel
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Default capacity of each client's outbound queue
pub const DEFAULT_CLIENT_BUFFER: usize = 32;

/// Default cap on a single WebSocket message
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address to listen on
    pub addr: String,
    /// Commands queued for the SignalServer actor
    pub command_buffer: usize,
    /// Messages queued per client before new ones are dropped
    pub client_buffer: usize,
    /// Largest accepted inbound WebSocket message, in bytes
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            command_buffer: DEFAULT_COMMAND_BUFFER,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            addr: lookup("SIGNAL_RELAY_ADDR").unwrap_or(defaults.addr),
            command_buffer: parse_size(
                &lookup,
                "SIGNAL_RELAY_COMMAND_BUFFER",
                defaults.command_buffer,
            )?,
            client_buffer: parse_size(
                &lookup,
                "SIGNAL_RELAY_CLIENT_BUFFER",
                defaults.client_buffer,
            )?,
            max_message_size: parse_size(
                &lookup,
                "SIGNAL_RELAY_MAX_MESSAGE_SIZE",
                defaults.max_message_size,
            )?,
        })
    }
}

/// Parse a positive size; channel capacities of zero are invalid
fn parse_size(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(AppError::Config(format!("{} must be greater than zero", key))),
        Ok(value) => Ok(value),
        Err(e) => Err(AppError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}
