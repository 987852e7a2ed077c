use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{acquisitions, clients, handlers, library, middleware::metrics_middleware, search, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes: Router<Arc<AppState>> = Router::new()
        // Health, config and background status
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        // Search
        .route("/search", post(search::search))
        .route("/indexers", get(search::list_indexers))
        .route("/indexers/{name}/capabilities", get(search::get_capabilities))
        // Download clients
        .route("/clients", get(clients::list_clients))
        .route("/clients/test", post(clients::test_clients))
        // Acquisitions
        .route("/acquisitions", get(acquisitions::list_acquisitions))
        .route("/acquisitions", post(acquisitions::initiate))
        .route("/acquisitions/purge", post(acquisitions::purge_terminal))
        .route("/acquisitions/missing", post(acquisitions::acquire_missing))
        .route("/acquisitions/{id}", get(acquisitions::get_acquisition))
        .route("/acquisitions/{id}", delete(acquisitions::purge))
        .route("/acquisitions/{id}/cancel", post(acquisitions::cancel))
        .route("/acquisitions/{id}/retry", post(acquisitions::retry))
        // Library
        .route("/library", get(library::list_files))
        // Event stream
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
