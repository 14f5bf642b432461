//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, frame
//! parsing, and bidirectional communication with the SignalServer.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::message::{ClientFrame, ServerMessage};
use crate::server::{ServerCommand, SignalServer};

/// Start the SignalServer actor and accept connections forever
pub async fn serve(listener: TcpListener, config: Config) {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    tokio::spawn(SignalServer::new(cmd_rx).run());

    info!("SignalServer actor started");

    let config = Arc::new(config);
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let config = Arc::clone(&config);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, &config).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers the client, and pumps
/// frames in both directions until either side closes.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: &Config,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    let ws_stream = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.client_buffer);

    // Register with SignalServer; it queues the client_details greeting
    let (id_tx, id_rx) = oneshot::channel();
    cmd_tx
        .send(ServerCommand::Connect {
            sender: msg_tx,
            respond_to: id_tx,
        })
        .await
        .map_err(|_| AppError::ChannelSend)?;
    let client_id = id_rx.await.map_err(|_| AppError::ChannelSend)?;

    info!("Client {} connected from {}", client_id, peer_addr);

    let cmd_tx_read = cmd_tx.clone();
    let read_id = client_id.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    //
    // Each frame is awaited into the bounded command channel before the
    // next one is read, so a client has at most one frame in flight and
    // frames are handled in the order they arrived.
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match ClientFrame::parse(&text) {
                    Ok(frame) => {
                        let cmd = ServerCommand::Frame {
                            client_id: read_id.clone(),
                            frame,
                        };
                        if cmd_tx_read.send(cmd).await.is_err() {
                            debug!("Server closed, ending read task for {}", read_id);
                            break;
                        }
                    }
                    Err(e) => {
                        // No parsed origin to answer, so the frame is dropped
                        warn!("Malformed frame from {}: {}", read_id, e);
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", read_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong is handled automatically by tungstenite
                }
                Ok(_) => {
                    debug!("Ignoring non-text frame from {}", read_id);
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", read_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", read_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                }
            }
        }
        debug!("Write task ended for client");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }

    // Send disconnect command
    let _ = cmd_tx
        .send(ServerCommand::Disconnect {
            client_id: client_id.clone(),
        })
        .await;

    info!("Client {} disconnected", client_id);

    Ok(())
}
