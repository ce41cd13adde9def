//! Business logic powering the admin REST routes: photo upload and board
//! generation, printable QR cards, manual unlocks and the destructive reset.

use rand::rng;
use tracing::{info, warn};
use url::Url;

use crate::{
    dto::game::{
        ActionResponse, AdminGameView, ArtifactView, UnlockResponse, UploadPhotoRequest,
        UploadPhotoResponse,
    },
    error::ServiceError,
    services::{
        artifacts::{self, ArtifactError},
        game_service, public_service,
    },
    state::{
        SharedState,
        game::{GameState, generate_sections},
    },
};

/// Store a new photo with a freshly generated board, replacing any previous
/// game and invalidating every printed card.
pub async fn upload_photo(
    state: &SharedState,
    payload: UploadPhotoRequest,
) -> Result<UploadPhotoResponse, ServiceError> {
    let store = state.require_store().await?;
    let config = state.config();
    let grid_size = payload.grid_size.unwrap_or(config.grid_size);
    let base_url = resolve_base_url(state, payload.base_url.as_deref())?;

    let sections = generate_sections(grid_size, &config.code_prefix, &mut rng());
    let image_url = payload.image_url.trim().to_owned();
    let game = store
        .run_exclusive(|| store.save(image_url, sections))
        .await?;
    info!(
        grid_size,
        sections = game.total(),
        "photo uploaded; new board generated"
    );

    let artifacts = match base_url {
        Some(base) => render_cards(&game, &base)?,
        None => Vec::new(),
    };

    Ok(UploadPhotoResponse {
        game: AdminGameView::from(&game),
        artifacts,
    })
}

/// Full board including codes.
pub async fn game_snapshot(state: &SharedState) -> Result<AdminGameView, ServiceError> {
    let game = configured_game(state).await?;
    Ok(AdminGameView::from(&game))
}

/// QR cards of every section of the current board.
pub async fn list_artifacts(
    state: &SharedState,
    base_url: Option<&str>,
) -> Result<Vec<ArtifactView>, ServiceError> {
    let base = require_base_url(state, base_url)?;
    let game = configured_game(state).await?;
    render_cards(&game, &base)
}

/// SVG document of one section's QR card.
pub async fn artifact_svg(
    state: &SharedState,
    section_id: u32,
    base_url: Option<&str>,
) -> Result<String, ServiceError> {
    let base = require_base_url(state, base_url)?;
    let game = configured_game(state).await?;
    let section = game
        .sections
        .get(section_id as usize)
        .ok_or_else(|| ServiceError::NotFound(format!("section {section_id}")))?;

    artifacts::render_artifact(section, &base)
        .map(|artifact| artifact.svg)
        .map_err(artifact_error)
}

/// Reveal a section without its code. Same idempotence as a guest unlock.
pub async fn manual_unlock(
    state: &SharedState,
    section_id: u32,
) -> Result<UnlockResponse, ServiceError> {
    let store = state.require_store().await?;
    let outcome = game_service::unlock_by_index(store, section_id as usize).await?;
    info!(section = section_id, ?outcome, "manual unlock");
    public_service::unlock_response(state, outcome).await
}

/// Delete the game document. Refused unless the caller confirmed.
pub async fn reset_game(state: &SharedState, confirm: bool) -> Result<ActionResponse, ServiceError> {
    if !confirm {
        return Err(ServiceError::InvalidInput(
            "reset requires `confirm: true`".into(),
        ));
    }

    let store = state.require_store().await?;
    store.run_exclusive(|| store.reset()).await?;
    warn!("game reset; photo and progress cleared");
    Ok(ActionResponse::new("game reset"))
}

async fn configured_game(state: &SharedState) -> Result<GameState, ServiceError> {
    let store = state.require_store().await?;
    store
        .current()
        .await?
        .filter(GameState::is_configured)
        .ok_or(ServiceError::NoPhotoConfigured)
}

fn render_cards(game: &GameState, base: &Url) -> Result<Vec<ArtifactView>, ServiceError> {
    let cards = artifacts::generate_shareable_artifacts(&game.sections, base)
        .map_err(artifact_error)?;
    Ok(cards.into_iter().map(ArtifactView::from).collect())
}

/// Explicit base URL first, then the configured public URL.
fn resolve_base_url(
    state: &SharedState,
    explicit: Option<&str>,
) -> Result<Option<Url>, ServiceError> {
    explicit
        .or(state.config().public_base_url.as_deref())
        .map(artifacts::parse_base_url)
        .transpose()
        .map_err(artifact_error)
}

fn require_base_url(state: &SharedState, explicit: Option<&str>) -> Result<Url, ServiceError> {
    resolve_base_url(state, explicit)?.ok_or_else(|| {
        ServiceError::InvalidInput(
            "no base URL: pass `baseUrl` or configure `publicBaseUrl`".into(),
        )
    })
}

fn artifact_error(err: ArtifactError) -> ServiceError {
    ServiceError::InvalidInput(err.to_string())
}
