//! HTTP control surface.
//!
//! Stateless handlers over the supervisor's read-only state and the backend
//! client's operations. Session and timer state are never mutated here except
//! through the supervisor's documented entry points.

mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use wweb::{BackendClient, SupervisorHandle};

#[derive(Clone)]
pub struct AppState {
    pub supervisor: SupervisorHandle,
    pub client: Arc<dyn BackendClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/send", post(handlers::send))
        .route("/status", get(handlers::status))
        .route("/qr", get(handlers::qr_page))
        .route("/qr.png", get(handlers::qr_png))
        .route("/session/clear", post(handlers::clear_session))
        .with_state(state)
}
