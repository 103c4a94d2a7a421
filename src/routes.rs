use crate::{handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/media", get(handlers::list_media).post(handlers::create_media))
        .route("/media/{id}", get(handlers::get_media).delete(handlers::delete_media))
        .route("/members", get(handlers::list_members).post(handlers::create_member))
        .route("/login", post(handlers::login))
        .route("/stats", get(handlers::stats))
        .route("/reload", post(handlers::reload))
        .route("/api/database", get(handlers::export_database))
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}
