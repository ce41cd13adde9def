//! Entry-URL visits: resolve the scanned code through a client sync loop and
//! remember the outcome for the visitor's next dashboard load.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{SharedState, game::UnlockOutcome},
    sync::{
        ClientSync, SyncOptions,
        entry::{MemoryNavigator, Navigator},
    },
};

/// Cookie identifying a visitor across the redirect.
pub const VISIT_COOKIE: &str = "photo_reveal_visit";

/// Where to send the visitor after the entry URL was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRedirect {
    /// Clean location, without the `code` parameter.
    pub location: String,
    /// Visitor id to store in the cookie.
    pub visitor: Uuid,
    /// `None` when the entry URL carried no code.
    pub outcome: Option<UnlockOutcome>,
}

/// Resolve the code carried by `location` and record the result for `visitor`
/// (a fresh visitor id is minted when absent).
pub async fn enter(
    state: &SharedState,
    location: String,
    visitor: Option<Uuid>,
) -> Result<EntryRedirect, ServiceError> {
    let store = state.require_store().await?.clone();
    let navigator = Arc::new(MemoryNavigator::new(location));
    let sync = ClientSync::start(
        store,
        navigator.clone(),
        SyncOptions::from(state.config()),
    );

    let outcome = timeout(state.config().entry_timeout, sync.resolved())
        .await
        .map_err(|_| {
            let error = sync.current().error;
            warn!(?error, "entry code not resolved in time");
            ServiceError::Timeout
        })?;

    let visitor = visitor.unwrap_or_else(Uuid::new_v4);
    if let Some(outcome) = outcome {
        info!(%visitor, ?outcome, "entry visit resolved");
        state.record_visit(visitor, outcome);
    }

    Ok(EntryRedirect {
        location: navigator.location(),
        visitor,
        outcome,
    })
}

/// Visitor id from the request cookies, if present and well formed.
pub fn visitor_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == VISIT_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value for `visitor`.
pub fn visit_cookie(visitor: Uuid) -> String {
    format!("{VISIT_COOKIE}={visitor}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn visitor_cookie_is_found_among_others() {
        let visitor = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {VISIT_COOKIE}={visitor}; x=1")).unwrap(),
        );
        assert_eq!(visitor_from_headers(&headers), Some(visitor));
    }

    #[test]
    fn malformed_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("photo_reveal_visit=not-a-uuid"),
        );
        assert_eq!(visitor_from_headers(&headers), None);
        assert_eq!(visitor_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_round_trips_through_headers() {
        let visitor = Uuid::new_v4();
        let set_cookie = visit_cookie(visitor);
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
        assert_eq!(visitor_from_headers(&headers), Some(visitor));
    }
}
