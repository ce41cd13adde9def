use axum::{
    Json, Router,
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::game::{ActionResponse, DashboardResponse, GameView, UnlockRequest, UnlockResponse},
    error::AppError,
    services::{public_service, visit_service},
    state::SharedState,
    sync::entry::EntryUrl,
};

/// Guest-facing routes: entry URL, dashboard, typed codes and the public board.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(entry))
        .route("/visit/dismiss", post(dismiss_visit))
        .route("/unlock", post(unlock))
        .route("/game", get(game))
}

/// Entry point of QR codes. With a `code` parameter the code is resolved and
/// the visitor is redirected to the clean URL; without one the dashboard is returned.
#[utoipa::path(
    get,
    path = "/",
    tag = "game",
    params(("code" = Option<String>, Query, description = "Unlock code carried by a QR card")),
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 303, description = "Code resolved; redirect to the clean URL"),
        (status = 503, description = "Store unavailable or resolution timed out")
    )
)]
pub async fn entry(
    State(state): State<SharedState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let visitor = visit_service::visitor_from_headers(&headers);
    let location = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| "/".into());

    let has_code = EntryUrl::parse(&location)
        .ok()
        .and_then(|entry| entry.code())
        .is_some();
    if !has_code {
        let dashboard = public_service::dashboard(&state, visitor).await?;
        return Ok(Json(dashboard).into_response());
    }

    let redirect = visit_service::enter(&state, location, visitor).await?;
    let location = HeaderValue::from_str(&redirect.location)
        .map_err(|err| AppError::Internal(err.to_string()))?;
    let cookie = HeaderValue::from_str(&visit_service::visit_cookie(redirect.visitor))
        .map_err(|err| AppError::Internal(err.to_string()))?;

    Ok((
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}

/// Close the visitor's pending notice.
#[utoipa::path(
    post,
    path = "/visit/dismiss",
    tag = "game",
    responses((status = 200, description = "Notice dismissed", body = ActionResponse))
)]
pub async fn dismiss_visit(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<ActionResponse> {
    let dismissed = visit_service::visitor_from_headers(&headers)
        .is_some_and(|visitor| state.dismiss_visit(&visitor));
    Json(ActionResponse::new(if dismissed {
        "notice dismissed"
    } else {
        "nothing to dismiss"
    }))
}

/// Submit a typed-in code.
#[utoipa::path(
    post,
    path = "/unlock",
    tag = "game",
    request_body = UnlockRequest,
    responses(
        (status = 200, description = "Section unlocked or already unlocked", body = UnlockResponse),
        (status = 404, description = "Invalid code"),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn unlock(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<UnlockRequest>>,
) -> Result<Json<UnlockResponse>, AppError> {
    Ok(Json(public_service::submit_code(&state, &payload.code).await?))
}

/// Current board without codes.
#[utoipa::path(
    get,
    path = "/game",
    tag = "game",
    responses(
        (status = 200, description = "Current board", body = GameView),
        (status = 404, description = "No photo configured")
    )
)]
pub async fn game(State(state): State<SharedState>) -> Result<Json<GameView>, AppError> {
    Ok(Json(public_service::game_view(&state).await?))
}
