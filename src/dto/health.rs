use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Storage backend in use ("couchdb", "mongodb" or "local").
    pub backend: String,
    /// Open store subscriptions (SSE clients, sync loops, observers).
    pub subscribers: usize,
}

impl HealthResponse {
    /// Build the payload from the degraded flag.
    pub fn new(degraded: bool, backend: impl Into<String>, subscribers: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            backend: backend.into(),
            subscribers,
        }
    }
}
