use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const REFRESH_INTERVAL: Duration = Duration::from_secs(2);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect the storage backend, keep it healthy, and keep the shared state in
/// degraded mode while it is unavailable.
///
/// Shared backends are also polled for changes made by other server
/// instances so local subscribers see them.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !supervise(&state, store.as_ref()).await {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                }
                state.clear_game_store().await;

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Health-check loop for an installed backend. Returns once reconnecting gave up.
async fn supervise(state: &SharedState, store: &dyn GameStore) -> bool {
    let shared = store.is_shared();
    let mut next_health_check = Instant::now();

    loop {
        if Instant::now() >= next_health_check {
            match store.health_check().await {
                Ok(()) => {
                    if state.is_degraded().await {
                        info!("storage healthy again; leaving degraded mode");
                        state.update_degraded(false).await;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "storage health check failed");
                    if !reconnect(state, store).await {
                        return false;
                    }
                    state.update_degraded(false).await;
                }
            }
            next_health_check = Instant::now() + HEALTH_POLL_INTERVAL;
        }

        if shared {
            if let Err(err) = state.store().refresh().await {
                debug!(error = %err, "refresh from shared storage failed");
            }
            sleep(REFRESH_INTERVAL).await;
        } else {
            sleep(HEALTH_POLL_INTERVAL).await;
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
