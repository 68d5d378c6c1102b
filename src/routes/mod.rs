use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::state::SharedState;

/// OpenAPI document and Swagger UI.
pub mod docs;
/// Health endpoint.
pub mod health;
/// Presence ingestion endpoints.
pub mod presence;
/// Viewer WebSocket endpoint.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// When a static directory is configured, unknown paths fall back to the
/// front-end bundle with `index.html` as the catch-all page.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(presence::router());

    let docs_router = docs::router(state.clone());
    let router = api_router.merge(docs_router);

    let router = match state.config().static_dir.clone() {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).not_found_service(index))
        }
        None => router,
    };

    router.with_state(state)
}
