use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        game::GameView,
        sse::{GameEmpty, ServerEvent, SystemStatus},
    },
    error::ServiceError,
    state::{SharedState, store::Snapshot, store::Subscription},
};

const EVENT_GAME_STATE: &str = "game.state";
const EVENT_GAME_EMPTY: &str = "game.empty";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Map a store snapshot to the event pushed to guests. Codes are never included.
pub fn game_event(snapshot: &Snapshot) -> serde_json::Result<ServerEvent> {
    match snapshot.as_deref() {
        Some(game) if game.is_configured() => {
            ServerEvent::json(Some(EVENT_GAME_STATE.to_string()), &GameView::from(game))
        }
        _ => ServerEvent::json(
            Some(EVENT_GAME_EMPTY.to_string()),
            &GameEmpty {
                message: "no photo configured".into(),
            },
        ),
    }
}

/// Open a store subscription for a new SSE client.
pub async fn subscribe_game(state: &SharedState) -> Result<Subscription, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.subscribe().await?)
}

/// Turn a store subscription into an SSE response. The current state goes out
/// first, then one event per store change and per degraded-mode flip.
pub fn to_sse_stream(
    mut subscription: Subscription,
    mut degraded: watch::Receiver<bool>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads store changes and status flips, pushes into mpsc
    tokio::spawn(async move {
        loop {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                snapshot = subscription.next() => match snapshot {
                    Some(snapshot) => game_event(&snapshot),
                    None => break,
                },
                changed = degraded.changed() => match changed {
                    Ok(()) => {
                        let flag = *degraded.borrow_and_update();
                        ServerEvent::json(
                            Some(EVENT_SYSTEM_STATUS.to_string()),
                            &SystemStatus { degraded: flag },
                        )
                    }
                    Err(_) => break,
                },
            };

            let payload = match payload {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "failed to serialize SSE payload");
                    continue;
                }
            };

            let mut event = Event::default().data(payload.data);
            if let Some(name) = payload.event {
                event = event.event(name);
            }
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
        }

        info!("game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
