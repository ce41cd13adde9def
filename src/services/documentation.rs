use utoipa::OpenApi;

#[derive(OpenApi)]
/// OpenAPI description of the photo reveal backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::game_stream,
        crate::routes::game::entry,
        crate::routes::game::dismiss_visit,
        crate::routes::game::unlock,
        crate::routes::game::game,
        crate::routes::admin::get_game,
        crate::routes::admin::upload_photo,
        crate::routes::admin::list_artifacts,
        crate::routes::admin::artifact_svg,
        crate::routes::admin::unlock_section,
        crate::routes::admin::reset_game,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::GameView,
            crate::dto::game::SectionView,
            crate::dto::game::AdminGameView,
            crate::dto::game::AdminSectionView,
            crate::dto::game::UploadPhotoRequest,
            crate::dto::game::UploadPhotoResponse,
            crate::dto::game::ArtifactView,
            crate::dto::game::UnlockRequest,
            crate::dto::game::UnlockResponse,
            crate::dto::game::UnlockStatus,
            crate::dto::game::ResetRequest,
            crate::dto::game::ActionResponse,
            crate::dto::game::VisitNotice,
            crate::dto::game::NoticeKind,
            crate::dto::game::DashboardPhase,
            crate::dto::game::DashboardResponse,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::GameEmpty,
        )
    ),
    tags(
        (name = "health", description = "Liveness and storage status"),
        (name = "sse", description = "Live board updates"),
        (name = "game", description = "Guest entry, typed codes and the public board"),
        (name = "admin", description = "Photo upload, QR cards and moderation"),
    )
)]
pub struct ApiDoc;
