use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use quiz_persistence::connect_and_migrate;
use quiz_server::{
    config::Config, create_routes, persistence::PersistenceBridge, room_manager::RoomManager,
    websocket::ConnectionManager,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting quiz session coordinator...");

    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());

    // Initialize database connection and run migrations
    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };

    let bridge = Arc::new(PersistenceBridge::new(
        db,
        Duration::from_secs(config.results_cache_ttl_seconds),
    ));
    let room_manager = Arc::new(RoomManager::new(
        connection_manager.clone(),
        bridge.clone(),
        Duration::from_secs(config.auto_next_delay_seconds),
    ));

    let routes = create_routes(connection_manager.clone(), room_manager.clone(), bridge);

    // Start idle-room sweeper
    let sweeper_room_manager = room_manager.clone();
    let room_timeout = Duration::from_secs(config.room_timeout_minutes * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            sweeper_room_manager.cleanup_idle_rooms(room_timeout).await;
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().unwrap(),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
