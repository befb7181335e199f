use super::handlers;
use super::state::AppState;
use super::ws;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health check
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Roster queries
        .route("/streams", get(handlers::list_streams))
        .route("/past-streams", get(handlers::list_past_streams))
        .route(
            "/past-streams/:stream_id",
            get(handlers::get_past_stream).delete(handlers::delete_past_stream),
        )
        // Recording intake
        .route(
            "/upload-recording",
            post(handlers::upload_recording).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        // Signaling
        .route("/ws/dashboard", get(ws::dashboard_socket))
        .route("/ws/broadcast/:stream_id", get(ws::broadcast_socket))
        .route("/ws/view/:stream_id", get(ws::view_socket));

    // Only a local path prefix can be served from here; anything else points
    // at an external host.
    let prefix = state.recordings_url_prefix.trim_end_matches('/');
    if prefix.starts_with('/') && prefix.len() > 1 {
        router = router.nest_service(prefix, ServeDir::new(&state.recordings_dir));
    }

    router
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
