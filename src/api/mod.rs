pub mod health;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(webhooks::webhook_routes())
        .merge(health::health_routes())
        .with_state(state)
}
