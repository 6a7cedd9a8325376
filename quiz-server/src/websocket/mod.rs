use futures_util::{SinkExt, StreamExt};
use serde_json;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::room_manager::RoomManager;
use quiz_types::{ClientMessage, ConnectionId};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    room_manager: Arc<RoomManager>,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();

    // Receiver for outgoing pushes addressed to this connection.
    let message_receiver = connection_manager.create_connection(connection_id).await;

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        room_manager.clone(),
    );

    let incoming_handler = {
        let message_handler = message_handler.clone();
        let mut rate_limiter = RateLimiter::new();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        handle_message(msg, &mut rate_limiter, &message_handler, connection_id)
                            .await;
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {:?}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!("Failed to send message to {}: {:?}", connection_id, e);
                    break;
                }
            }
        }
    };

    // Either side closing tears the whole connection down.
    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id).await;
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) {
    // Over-limit messages are dropped, not fatal to the connection.
    if !rate_limiter.try_acquire() {
        warn!("Rate limit exceeded for connection {}", connection_id);
        return;
    }

    if !msg.is_text() {
        return;
    }

    let Ok(text) = msg.to_str() else {
        return;
    };

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => {
            message_handler.handle_message(client_message).await;
        }
        Err(e) => {
            warn!("Invalid message from {}: {}", connection_id, e);
            message_handler
                .send_error(&format!("Invalid message: {}", e))
                .await;
        }
    }
}
