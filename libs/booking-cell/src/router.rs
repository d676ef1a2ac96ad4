use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/slots", get(handlers::get_week_slots));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/sessions", post(handlers::book_session).get(handlers::list_sessions))
        .route("/sessions/{session_id}/cancel", patch(handlers::cancel_session))
        .route("/sessions/{session_id}/complete", patch(handlers::complete_session))
        .route("/sessions/{session_id}/payment", patch(handlers::set_payment_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
