pub mod api;
pub mod auth;
pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod membership;
pub mod message_log;
pub mod registry;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let api_routes = Router::new()
        .route(
            "/rooms/{room_id}/messages",
            axum::routing::get(api::room_history),
        )
        .route(
            "/rooms/{room_id}/messages/count",
            axum::routing::get(api::room_message_count),
        );

    let app = Router::new()
        .route("/ws", axum::routing::get(connection::ws_handler))
        .route("/healthz", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}
