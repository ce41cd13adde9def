use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Board, unlock, admin and dashboard payloads.
pub mod game;
/// Health check payload.
pub mod health;
/// Server-sent event payloads.
pub mod sse;
pub mod validation;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
