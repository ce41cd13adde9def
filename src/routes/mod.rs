use axum::Router;

use crate::state::SharedState;

/// Admin setup and moderation routes.
pub mod admin;
/// Swagger UI.
pub mod docs;
/// Guest-facing routes.
pub mod game;
/// Health check route.
pub mod health;
/// Server-sent events route.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(game::router())
        .merge(admin::router(state.clone()));

    api_router.merge(docs::router()).with_state(state)
}
