mod error;
mod rest;
mod types;
mod websocket;

pub use error::{ApiError, ApiResult};
pub use rest::RestApi;
pub use types::*;
pub use websocket::{client_websocket_handler, engine_websocket_handler, EngineLink};

use crate::metrics::metrics_route;
use crate::service::TransferService;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the daemon's API server: REST calls, the streaming WebSocket, the engine
/// socket when an engine bridge is in use, and `/metrics`
pub fn create_api_server(service: Arc<TransferService>, engine: Option<EngineLink>) -> Router {
    let rest_api = RestApi::new(service.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_router = Router::new()
        .route("/api/v1/ws", get(client_websocket_handler))
        .with_state(service);

    let mut app = Router::new()
        .merge(rest_api.router())
        .merge(ws_router)
        .route("/metrics", metrics_route());

    if let Some(link) = engine {
        app = app.merge(
            Router::new()
                .route("/engine", get(engine_websocket_handler))
                .with_state(link),
        );
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}
