use std::sync::Arc;
use tracing::debug;

use crate::room_manager::RoomManager;
use crate::websocket::connection::ConnectionManager;
use quiz_types::{ClientMessage, ConnectionId, ServerMessage};

/// Per-connection dispatcher. Guard failures never close the socket;
/// they come back to the offending connection as an error push.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    room_manager: Arc<RoomManager>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        room_manager: Arc<RoomManager>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            room_manager,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        debug!("Handling message from {}: {:?}", self.connection_id, message);

        let result = match message {
            ClientMessage::CreateRoom {
                quiz_id,
                host_id,
                host_name,
                team_id,
                settings,
            } => self
                .room_manager
                .create_room(
                    self.connection_id,
                    quiz_id,
                    host_id,
                    host_name,
                    team_id,
                    settings,
                )
                .await
                .map(|_| ()),
            ClientMessage::UpdateSettings { room_id, settings } => {
                self.room_manager
                    .update_settings(self.connection_id, &room_id, settings)
                    .await
            }
            ClientMessage::JoinRoom {
                room_id,
                user_id,
                username,
            } => {
                self.room_manager
                    .join_room(self.connection_id, &room_id, user_id, username)
                    .await
            }
            ClientMessage::StartGame { room_id } => {
                self.room_manager
                    .start_game(self.connection_id, &room_id)
                    .await
            }
            ClientMessage::EndGame { room_id } => {
                self.room_manager
                    .end_game(self.connection_id, &room_id)
                    .await
            }
            ClientMessage::SubmitAnswer {
                room_id,
                user_id,
                option_index,
            } => self
                .room_manager
                .submit_answer(&room_id, &user_id, option_index)
                .await
                .map(|_| ()),
            ClientMessage::RequestNextQuestion { room_id } => {
                self.room_manager
                    .request_next_question(self.connection_id, &room_id)
                    .await
            }
            ClientMessage::PlayAgain { room_id } => {
                self.room_manager
                    .play_again(self.connection_id, &room_id)
                    .await
            }
        };

        if let Err(e) = result {
            self.send_error(&e.to_string()).await;
        }
    }

    pub async fn handle_disconnect(&self) {
        self.room_manager
            .handle_disconnect(self.connection_id)
            .await;
    }

    pub async fn send_error(&self, text: &str) {
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::ErrorMessage {
                    text: text.to_string(),
                },
            )
            .await;
    }
}
