use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::warn;

use crate::config::ServerSection;

use super::app_state::AppState;
use super::ws_handler;

/// Build the axum router: the relay WebSocket plus an optional static client.
pub fn build_router(state: Arc<AppState>, config: &ServerSection) -> Router {
    let router = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Static files with SPA fallback; unmatched routes serve index.html
    let router = match &config.static_dir {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => router,
    };

    router.layer(cors_layer(&config.cors_origin)).with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(%origin, "invalid CORS origin, allowing any origin");
            layer.allow_origin(Any)
        }
    }
}
