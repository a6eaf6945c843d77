use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::flagged::routes as flagged_routes;
use crate::state::AppState;
use crate::tabs::routes as tab_routes;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint (user identified via ?userId=)
    let ws_routes = Router::new().route("/socket", get(ws_handler::ws_upgrade));

    let tab_routes = Router::new()
        .route("/api/tabs", get(tab_routes::get_tabs))
        .route("/api/tabs/close", post(tab_routes::close_tab))
        .route("/api/tabs/close-all", post(tab_routes::close_all_tabs))
        .route("/api/tabs/live", get(tab_routes::get_live_tabs))
        .route("/api/tabs/close-live", post(tab_routes::close_live_tabs));

    let flagged_routes = Router::new().route(
        "/api/flagged-urls",
        get(flagged_routes::list_flagged)
            .post(flagged_routes::add_flagged)
            .delete(flagged_routes::remove_flagged),
    );

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(tab_routes)
        .merge(flagged_routes)
        .merge(health)
        // Dashboards call the REST API from other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
