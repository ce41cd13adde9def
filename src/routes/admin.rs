use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::game::{
        ActionResponse, AdminGameView, ArtifactView, ArtifactsQuery, ResetRequest,
        UnlockResponse, UploadPhotoRequest, UploadPhotoResponse,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

// Room for the JSON envelope around an embedded image.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Admin endpoints for setting up and driving the board.
pub fn router(state: SharedState) -> Router<SharedState> {
    let upload_limit = state.config().max_image_bytes + BODY_OVERHEAD;

    Router::new()
        .route("/admin/game", get(get_game))
        .route(
            "/admin/photo",
            post(upload_photo).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/admin/artifacts", get(list_artifacts))
        .route("/admin/artifacts/{id}", get(artifact_svg))
        .route("/admin/sections/{id}/unlock", post(unlock_section))
        .route("/admin/reset", post(reset_game))
}

/// Full board including unlock codes.
#[utoipa::path(
    get,
    path = "/admin/game",
    tag = "admin",
    responses(
        (status = 200, description = "Current board with codes", body = AdminGameView),
        (status = 404, description = "No photo configured")
    )
)]
pub async fn get_game(State(state): State<SharedState>) -> Result<Json<AdminGameView>, AppError> {
    Ok(Json(admin_service::game_snapshot(&state).await?))
}

/// Upload a photo and generate a fresh board, invalidating printed cards.
#[utoipa::path(
    post,
    path = "/admin/photo",
    tag = "admin",
    request_body = UploadPhotoRequest,
    responses(
        (status = 200, description = "Board generated", body = UploadPhotoResponse),
        (status = 400, description = "Invalid image or grid size")
    )
)]
pub async fn upload_photo(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<UploadPhotoRequest>>,
) -> Result<Json<UploadPhotoResponse>, AppError> {
    Ok(Json(admin_service::upload_photo(&state, payload).await?))
}

/// QR cards for every section.
#[utoipa::path(
    get,
    path = "/admin/artifacts",
    tag = "admin",
    params(ArtifactsQuery),
    responses(
        (status = 200, description = "Printable QR cards", body = [ArtifactView]),
        (status = 400, description = "No base URL known")
    )
)]
pub async fn list_artifacts(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ArtifactsQuery>>,
) -> Result<Json<Vec<ArtifactView>>, AppError> {
    Ok(Json(
        admin_service::list_artifacts(&state, query.base_url.as_deref()).await?,
    ))
}

/// QR card of one section as an SVG image.
#[utoipa::path(
    get,
    path = "/admin/artifacts/{id}",
    tag = "admin",
    params(
        ("id" = u32, Path, description = "Section id"),
        ArtifactsQuery
    ),
    responses(
        (status = 200, description = "SVG image", content_type = "image/svg+xml", body = String),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn artifact_svg(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
    Valid(Query(query)): Valid<Query<ArtifactsQuery>>,
) -> Result<impl IntoResponse, AppError> {
    let svg = admin_service::artifact_svg(&state, id, query.base_url.as_deref()).await?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// Reveal a section without its code.
#[utoipa::path(
    post,
    path = "/admin/sections/{id}/unlock",
    tag = "admin",
    params(("id" = u32, Path, description = "Section id")),
    responses(
        (status = 200, description = "Section unlocked or already unlocked", body = UnlockResponse),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn unlock_section(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<Json<UnlockResponse>, AppError> {
    Ok(Json(admin_service::manual_unlock(&state, id).await?))
}

/// Delete the photo and all progress. Requires `{"confirm": true}`.
#[utoipa::path(
    post,
    path = "/admin/reset",
    tag = "admin",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Game reset", body = ActionResponse),
        (status = 400, description = "Reset not confirmed")
    )
)]
pub async fn reset_game(
    State(state): State<SharedState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::reset_game(&state, payload.confirm).await?))
}
