//! Observer logging the reveal progress as the store changes.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::info;

use crate::{
    dao::storage::StorageResult,
    state::store::{StateStore, SubscriptionHandle},
};

/// Log every store change and, once, the moment the photo is complete.
pub async fn watch_progress(store: &StateStore) -> StorageResult<SubscriptionHandle> {
    let completed = Arc::new(AtomicBool::new(false));

    store
        .subscribe_with(move |snapshot| match snapshot.as_deref() {
            Some(game) if game.is_configured() => {
                info!(
                    unlocked = game.unlocked_count(),
                    total = game.total(),
                    "reveal progress"
                );
                let complete = game.is_complete();
                if complete && !completed.swap(true, Ordering::AcqRel) {
                    info!(total = game.total(), "photo fully revealed");
                } else if !complete {
                    completed.store(false, Ordering::Release);
                }
            }
            _ => {
                completed.store(false, Ordering::Release);
                info!("no photo configured");
            }
        })
        .await
}
