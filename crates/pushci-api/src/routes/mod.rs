//! API routes.

pub mod health;
pub mod logs;
pub mod webhooks;

use crate::AppState;
use axum::Router;

/// Build the main router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(webhooks::router())
        .merge(logs::router())
        .merge(health::router())
        .with_state(state)
}
