use std::sync::Arc;
use warp::Filter;

use crate::persistence::PersistenceBridge;
use crate::room_manager::RoomManager;
use crate::websocket::ConnectionManager;

pub mod config;
pub mod persistence;
pub mod room_manager;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    room_manager: Arc<RoomManager>,
    bridge: Arc<PersistenceBridge>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // Clone for filters
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let room_manager_filter = warp::any().map({
        let room_manager = room_manager.clone();
        move || room_manager.clone()
    });

    let bridge_filter = warp::any().map({
        let bridge = bridge.clone();
        move || bridge.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter.clone())
        .and(room_manager_filter.clone())
        .map(|ws: warp::ws::Ws, conn_mgr, room_mgr| {
            ws.on_upgrade(move |socket| websocket::handle_connection(socket, conn_mgr, room_mgr))
        });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Post-game results, served from the TTL cache
    let results = warp::path!("results" / String)
        .and(warp::get())
        .and(bridge_filter.clone())
        .and_then(handle_results_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    websocket
        .or(health)
        .or(results)
        .with(cors)
        .with(warp::log("quiz_server"))
}

async fn handle_results_request(
    session_id: String,
    bridge: Arc<PersistenceBridge>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match bridge.cached_results(&session_id) {
        Some(results) => Ok(warp::reply::with_status(
            warp::reply::json(&results),
            warp::http::StatusCode::OK,
        )),
        None => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Results not found or expired"
            })),
            warp::http::StatusCode::NOT_FOUND,
        )),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use migration::MigratorTrait;
    use quiz_persistence::repositories::{Quiz, QuizRepository};
    use quiz_types::{
        ClientMessage, FinalStanding, GamePhase, QuestionSnapshot, RoomSettings, ServerMessage,
    };
    use std::time::Duration;
    use uuid::Uuid;

    fn sample_questions() -> Vec<QuestionSnapshot> {
        vec![
            QuestionSnapshot {
                text: "What is 2 + 2?".to_string(),
                options: vec!["3".into(), "4".into(), "5".into()],
                correct_option: 1,
                points: 10,
                time_limit_seconds: 20,
            },
            QuestionSnapshot {
                text: "What color is the sky?".to_string(),
                options: vec!["Blue".into(), "Green".into()],
                correct_option: 0,
                points: 10,
                time_limit_seconds: 20,
            },
        ]
    }

    async fn create_test_app() -> (
        impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone,
        Arc<PersistenceBridge>,
    ) {
        let db = quiz_persistence::connect_to_memory_database()
            .await
            .unwrap();
        migration::Migrator::up(&db, None).await.unwrap();

        QuizRepository::new(db.clone())
            .create_quiz(&Quiz {
                id: "quiz-1".to_string(),
                title: "Arithmetic".to_string(),
                questions: sample_questions(),
            })
            .await
            .unwrap();

        let connection_manager = Arc::new(ConnectionManager::new());
        let bridge = Arc::new(PersistenceBridge::new(db, Duration::from_secs(600)));
        let room_manager = Arc::new(RoomManager::new(
            connection_manager.clone(),
            bridge.clone(),
            Duration::from_secs(5),
        ));

        (
            create_routes(connection_manager, room_manager, bridge.clone()),
            bridge,
        )
    }

    async fn recv_server_message(ws: &mut warp::test::WsClient) -> ServerMessage {
        let msg = ws.recv().await.expect("Should receive a message");
        serde_json::from_str(msg.to_str().expect("Should be text"))
            .expect("Should be a valid ServerMessage")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let (app, _) = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path("/nonexistent")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_websocket_invalid_message_gets_error_push() {
        let (app, _) = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text("not json").await;

        match recv_server_message(&mut ws).await {
            ServerMessage::ErrorMessage { text } => {
                assert!(text.contains("Invalid message"));
            }
            other => panic!("Expected error push, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_room_sends_lobby_snapshot() {
        let (app, _) = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let create = ClientMessage::CreateRoom {
            quiz_id: "quiz-1".to_string(),
            host_id: "host-1".to_string(),
            host_name: "Hosty".to_string(),
            team_id: None,
            settings: RoomSettings::default(),
        };
        ws.send_text(serde_json::to_string(&create).unwrap()).await;

        match recv_server_message(&mut ws).await {
            ServerMessage::GameUpdate(snapshot) => {
                assert_eq!(snapshot.game_state, GamePhase::Lobby);
                assert_eq!(snapshot.room_id.len(), 6);
                assert!(snapshot.room_id.chars().all(|c| c.is_ascii_digit()));
                assert_eq!(snapshot.participants.len(), 1);
                assert_eq!(snapshot.your_user_id, "host-1");
            }
            other => panic!("Expected lobby snapshot, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_action_on_unknown_room_gets_error_push() {
        let (app, _) = create_test_app().await;

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let join = ClientMessage::JoinRoom {
            room_id: "000000".to_string(),
            user_id: "p1".to_string(),
            username: "Pat".to_string(),
        };
        ws.send_text(serde_json::to_string(&join).unwrap()).await;

        match recv_server_message(&mut ws).await {
            ServerMessage::ErrorMessage { text } => {
                assert!(text.to_lowercase().contains("room"));
            }
            other => panic!("Expected error push, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_results_endpoint_misses_with_404() {
        let (app, _) = create_test_app().await;

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/results/{}", Uuid::new_v4()))
            .reply(&app)
            .await;

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_results_endpoint_serves_cached_results() {
        let (app, bridge) = create_test_app().await;

        let session_id = Uuid::new_v4();
        let standings = vec![FinalStanding {
            user_id: "p1".to_string(),
            display_name: "Pat".to_string(),
            score: 24,
            rank: 1,
        }];
        bridge
            .finalize_game(session_id, "quiz-1", 2, &standings)
            .await;

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/results/{}", session_id))
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["quizId"], "quiz-1");
        assert_eq!(body["participants"][0]["userId"], "p1");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let (app, _) = create_test_app().await;

        let response = warp::test::request()
            .method("OPTIONS")
            .path("/health")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "GET")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
    }
}
