//! Service helpers behind the guest-facing routes. Nothing here exposes codes.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::game::{
        DashboardPhase, DashboardResponse, GameView, UnlockResponse, UnlockStatus, VisitNotice,
    },
    error::ServiceError,
    services::game_service,
    state::{
        SharedState,
        game::{GameState, UnlockOutcome},
    },
};

/// Current board without codes, or [`ServiceError::NoPhotoConfigured`].
pub async fn game_view(state: &SharedState) -> Result<GameView, ServiceError> {
    let store = state.require_store().await?;
    store
        .current()
        .await?
        .filter(GameState::is_configured)
        .map(|game| GameView::from(&game))
        .ok_or(ServiceError::NoPhotoConfigured)
}

/// Unlock the section matching a typed-in code.
pub async fn submit_code(state: &SharedState, code: &str) -> Result<UnlockResponse, ServiceError> {
    let store = state.require_store().await?;
    let outcome = game_service::unlock_by_code(store, code).await?;
    info!(?outcome, "code submitted");
    unlock_response(state, outcome).await
}

/// Shape an unlock outcome for the API. `NotFound` becomes
/// [`ServiceError::InvalidCode`]; the other outcomes carry the fresh board.
pub async fn unlock_response(
    state: &SharedState,
    outcome: UnlockOutcome,
) -> Result<UnlockResponse, ServiceError> {
    let (status, section_id) = match outcome {
        UnlockOutcome::NewlyUnlocked(id) => (UnlockStatus::NewlyUnlocked, id),
        UnlockOutcome::AlreadyUnlocked(id) => (UnlockStatus::AlreadyUnlocked, id),
        UnlockOutcome::NotFound => return Err(ServiceError::InvalidCode),
    };

    let store = state.require_store().await?;
    let game = store.current().await?;
    Ok(UnlockResponse {
        status,
        section_id,
        message: VisitNotice::from(outcome).message,
        game: game.as_ref().map(GameView::from),
    })
}

/// Landing payload for `visitor`: their pending notice, if any, and the board.
pub async fn dashboard(
    state: &SharedState,
    visitor: Option<Uuid>,
) -> Result<DashboardResponse, ServiceError> {
    let store = state.require_store().await?;
    let game = store.current().await?;
    let notice = visitor
        .and_then(|id| state.visit_notice(&id))
        .map(VisitNotice::from);

    Ok(DashboardResponse {
        phase: if notice.is_some() {
            DashboardPhase::Resolved
        } else {
            DashboardPhase::Idle
        },
        notice,
        game: game
            .as_ref()
            .filter(|game| game.is_configured())
            .map(GameView::from),
    })
}
