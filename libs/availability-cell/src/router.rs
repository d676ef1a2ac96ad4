use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/", get(handlers::list_windows))
        .route("/day/{day_of_week}", get(handlers::windows_for_day));

    // Protected routes (specialist or admin JWT required)
    let protected_routes = Router::new()
        .route("/", post(handlers::upsert_window))
        .route("/{window_id}/disable", patch(handlers::disable_window))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
