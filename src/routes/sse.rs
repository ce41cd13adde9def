use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/game",
    tag = "sse",
    responses(
        (status = 200, description = "Game SSE stream: `game.state`, `game.empty` and `system.status` events", content_type = "text/event-stream", body = String),
        (status = 503, description = "Store unavailable")
    )
)]
/// Stream the board to guest views: the current state on connect, then every change.
pub async fn game_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_game(&state).await?;
    info!("New game SSE connection");
    Ok(sse_service::to_sse_stream(
        subscription,
        state.degraded_watcher(),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/game", get(game_stream))
}
