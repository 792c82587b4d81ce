//! # as-api
//!
//! The HTTP and WebSocket layer for AutoSync.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ws;

use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

pub use handlers::AppState;

/// Transport knobs that live outside the core.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub max_upload_bytes: usize,
    /// Served for every unmatched path when set.
    pub static_dir: Option<PathBuf>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: 512 * 1024 * 1024,
            static_dir: None,
        }
    }
}

/// Builds the full application router.
///
/// # Developer Note
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// sender address can fall back to the peer address.
pub fn router(state: AppState, options: RouterOptions) -> Router {
    let api = Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/messages", get(handlers::list_messages))
        .route("/api/send_text", post(handlers::send_text))
        .route("/api/upload", post(handlers::upload))
        .route("/api/download/{filename}", get(handlers::download))
        .route("/ws", get(ws::ws_upgrade))
        .layer(DefaultBodyLimit::max(options.max_upload_bytes));

    let app = match options.static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
        .with_state(state)
}
