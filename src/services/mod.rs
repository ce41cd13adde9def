/// Admin service for photo setup and board management.
pub mod admin_service;
/// QR card rendering for printable unlock codes.
pub mod artifacts;
/// OpenAPI documentation generation.
pub mod documentation;
/// Unlock resolver: code matching and idempotent unlocks.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Progress observer logging reveal progress.
pub mod progress;
/// Public service for guest-facing reads and code submission.
pub mod public_service;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor with degraded-mode handling.
pub mod storage_supervisor;
/// Entry-URL visits and visitor cookies.
pub mod visit_service;
