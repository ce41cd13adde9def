//! State store adapter: one shared game document behind save/unlock/subscribe.
//!
//! Every successful write is published on an in-process broadcast channel, so
//! every subscriber (including the writer) rehydrates from the store rather
//! than from its own optimistic copy.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use time::OffsetDateTime;
use tokio::{
    sync::{Mutex, RwLock, broadcast, broadcast::error::RecvError},
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    dao::{
        game_store::GameStore,
        models::GameStateEntity,
        storage::{StorageError, StorageResult},
    },
    state::game::{GameState, Section},
};

/// What subscribers receive: the whole document, or `None` when no game exists.
pub type Snapshot = Option<Arc<GameState>>;

const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Adapter owning the installed backend and the change channel.
pub struct StateStore {
    backend: RwLock<Option<Arc<dyn GameStore>>>,
    changes: broadcast::Sender<Snapshot>,
    last_published: Mutex<Option<Snapshot>>,
    write_gate: Mutex<()>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl StateStore {
    /// Create a detached store; operations fail until a backend is installed.
    pub fn new(capacity: usize) -> Self {
        let (changes, _receiver) = broadcast::channel(capacity);
        Self {
            backend: RwLock::new(None),
            changes,
            last_published: Mutex::new(None),
            write_gate: Mutex::new(()),
        }
    }

    /// Create a store already bound to `backend`.
    pub fn with_backend(backend: Arc<dyn GameStore>) -> Self {
        Self {
            backend: RwLock::new(Some(backend)),
            ..Self::default()
        }
    }

    /// Install (or swap) the backend.
    pub async fn install(&self, backend: Arc<dyn GameStore>) {
        *self.backend.write().await = Some(backend);
    }

    /// Drop the backend; later operations fail with [`StorageError::Detached`].
    pub async fn detach(&self) {
        self.backend.write().await.take();
    }

    /// Currently installed backend, if any.
    pub async fn backend(&self) -> Option<Arc<dyn GameStore>> {
        self.backend.read().await.clone()
    }

    /// Whether a backend is installed.
    pub async fn is_attached(&self) -> bool {
        self.backend.read().await.is_some()
    }

    async fn require_backend(&self) -> StorageResult<Arc<dyn GameStore>> {
        self.backend().await.ok_or(StorageError::Detached)
    }

    /// Read the current document straight from the backend.
    pub async fn current(&self) -> StorageResult<Option<GameState>> {
        let backend = self.require_backend().await?;
        Ok(backend.load().await?.map(Into::into))
    }

    /// Replace the whole document with a new image and board, then publish it.
    pub async fn save(&self, image_url: String, sections: Vec<Section>) -> StorageResult<GameState> {
        let backend = self.require_backend().await?;
        let game = GameState {
            image_url: Some(image_url),
            sections,
            updated_at: Some(OffsetDateTime::now_utc()),
        };
        backend.save(GameStateEntity::from(game.clone())).await?;
        self.publish(Some(Arc::new(game.clone()))).await;
        Ok(game)
    }

    /// Flag `current[index]` as unlocked in the stored document.
    ///
    /// The backend only applies the write while the stored section still
    /// carries the code seen in `current`; `Ok(None)` means the board changed
    /// (or disappeared) and nothing was written.
    pub async fn apply_unlock(
        &self,
        index: usize,
        current: &[Section],
    ) -> StorageResult<Option<GameState>> {
        let Some(section) = current.get(index) else {
            return Ok(None);
        };
        let backend = self.require_backend().await?;
        let updated = backend
            .unlock_section(index, section.code.clone(), OffsetDateTime::now_utc())
            .await?
            .map(GameState::from);

        if let Some(game) = &updated {
            self.publish(Some(Arc::new(game.clone()))).await;
        }
        Ok(updated)
    }

    /// Delete the document and publish the absent state.
    pub async fn reset(&self) -> StorageResult<()> {
        let backend = self.require_backend().await?;
        backend.clear().await?;
        self.publish(None).await;
        Ok(())
    }

    /// Reload from the backend and publish when it differs from what
    /// subscribers last saw. Returns whether something was published.
    ///
    /// The published-state lock is held across the read, so a write from this
    /// process cannot publish in between and be overwritten by an older read.
    /// A read that would lock sections of the board subscribers already saw
    /// unlocked is dropped.
    pub async fn refresh(&self) -> StorageResult<bool> {
        let mut last = self.last_published.lock().await;
        let latest: Snapshot = self.current().await?.map(Arc::new);

        if let Some(previous) = last.as_ref() {
            if *previous == latest {
                return Ok(false);
            }
            if let (Some(previous), Some(next)) = (previous, &latest) {
                if next.rolls_back(previous) {
                    debug!("ignoring stale read from shared backend");
                    return Ok(false);
                }
            }
        }

        debug!("shared backend changed outside this process");
        *last = Some(latest.clone());
        let _ = self.changes.send(latest);
        Ok(true)
    }

    /// Open a subscription whose first item is the current state.
    pub async fn subscribe(&self) -> StorageResult<Subscription> {
        // Listen before reading so no write can fall between the two.
        let receiver = self.changes.subscribe();
        let initial = self.current().await?.map(Arc::new);
        Ok(Subscription {
            initial: Some(initial),
            receiver,
        })
    }

    /// Callback flavour of [`StateStore::subscribe`].
    ///
    /// `callback` runs once with the current state before this returns, then
    /// once per change until the handle is unsubscribed or dropped.
    pub async fn subscribe_with<F>(&self, callback: F) -> StorageResult<SubscriptionHandle>
    where
        F: Fn(Snapshot) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe().await?;
        let active = Arc::new(AtomicBool::new(true));
        if let Some(initial) = subscription.initial.take() {
            callback(initial);
        }

        let flag = active.clone();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                if !flag.load(Ordering::Acquire) {
                    break;
                }
                callback(snapshot);
            }
        });

        Ok(SubscriptionHandle {
            active,
            task: Some(task),
        })
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Run `work` while holding the write gate so read-check-write sequences
    /// from this process never interleave.
    pub async fn run_exclusive<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _gate = self.write_gate.lock().await;
        work().await
    }

    async fn publish(&self, snapshot: Snapshot) {
        *self.last_published.lock().await = Some(snapshot.clone());
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(snapshot);
    }
}

/// Stream of snapshots: the current state first, then one per change.
pub struct Subscription {
    initial: Option<Snapshot>,
    receiver: broadcast::Receiver<Snapshot>,
}

impl Subscription {
    /// Wait for the next snapshot; `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Closed) => return None,
                // Snapshots are full documents, the newest one supersedes the skipped.
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscription lagged behind store changes");
                }
            }
        }
    }
}

/// Keeps a callback subscription alive; dropping it unsubscribes.
pub struct SubscriptionHandle {
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Stop delivering callbacks and release the listener.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex as StdMutex, time::Duration};

    use futures::future::BoxFuture;
    use tokio::sync::Notify;

    use super::*;
    use crate::dao::game_store::local::LocalGameStore;
    use uuid::Uuid;

    /// Backend whose next `load` pauses after reading until released.
    struct StallingStore {
        inner: LocalGameStore,
        stall_next_load: AtomicBool,
        read_done: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl GameStore for StallingStore {
        fn load(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
            let read = self.inner.load();
            let stall = self.stall_next_load.swap(false, Ordering::SeqCst);
            let read_done = self.read_done.clone();
            let release = self.release.clone();
            Box::pin(async move {
                let value = read.await;
                if stall {
                    read_done.notify_one();
                    release.notified().await;
                }
                value
            })
        }

        fn save(&self, game: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save(game)
        }

        fn unlock_section(
            &self,
            index: usize,
            code: String,
            updated_at: OffsetDateTime,
        ) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
            self.inner.unlock_section(index, code, updated_at)
        }

        fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.clear()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }

        fn is_shared(&self) -> bool {
            true
        }
    }

    async fn local_store() -> StateStore {
        let dir = std::env::temp_dir().join(format!("photo-reveal-store-{}", Uuid::new_v4()));
        let backend = LocalGameStore::open(dir).await.unwrap();
        StateStore::with_backend(Arc::new(backend))
    }

    fn sections(n: u32) -> Vec<Section> {
        (0..n * n)
            .map(|id| Section {
                id,
                code: format!("WED-T{id:04}"),
                is_unlocked: false,
                row: id / n,
                col: id % n,
            })
            .collect()
    }

    #[tokio::test]
    async fn detached_store_reports_detached() {
        let store = StateStore::default();
        assert!(matches!(store.current().await, Err(StorageError::Detached)));
        assert!(matches!(
            store.save("data:image/png;base64,".into(), sections(1)).await,
            Err(StorageError::Detached)
        ));
    }

    #[tokio::test]
    async fn subscription_starts_with_absent_sentinel_then_sees_own_writes() {
        let store = local_store().await;
        let mut subscription = store.subscribe().await.unwrap();
        assert_eq!(subscription.next().await, Some(None));

        let saved = store
            .save("https://example.com/p.jpg".into(), sections(2))
            .await
            .unwrap();
        let snapshot = subscription.next().await.unwrap().unwrap();
        assert_eq!(*snapshot, saved);

        store.apply_unlock(3, &saved.sections).await.unwrap().unwrap();
        let snapshot = subscription.next().await.unwrap().unwrap();
        assert!(snapshot.sections[3].is_unlocked);
        assert_eq!(snapshot.unlocked_count(), 1);

        store.reset().await.unwrap();
        assert_eq!(subscription.next().await, Some(None));
    }

    #[tokio::test]
    async fn unlock_against_replaced_board_is_ignored() {
        let store = local_store().await;
        let stale = store
            .save("https://example.com/a.jpg".into(), sections(2))
            .await
            .unwrap();
        let mut fresh_sections = sections(2);
        fresh_sections[0].code = "WED-NEWER".into();
        store
            .save("https://example.com/b.jpg".into(), fresh_sections)
            .await
            .unwrap();

        assert!(store.apply_unlock(0, &stale.sections).await.unwrap().is_none());
        let current = store.current().await.unwrap().unwrap();
        assert_eq!(current.unlocked_count(), 0);
    }

    #[tokio::test]
    async fn callback_runs_immediately_and_stops_after_unsubscribe() {
        let store = local_store().await;
        let seen: Arc<StdMutex<Vec<usize>>> = Arc::default();

        let sink = seen.clone();
        let handle = store
            .subscribe_with(move |snapshot| {
                let count = snapshot.map(|game| game.total()).unwrap_or(0);
                sink.lock().unwrap().push(count);
            })
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        store
            .save("https://example.com/p.jpg".into(), sections(3))
            .await
            .unwrap();
        for _ in 0..50 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 9]);

        handle.unsubscribe();
        store.reset().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_publishes_only_on_change() {
        let store = local_store().await;
        store
            .save("https://example.com/p.jpg".into(), sections(1))
            .await
            .unwrap();
        assert!(!store.refresh().await.unwrap());

        // Simulate another process rewriting the shared document.
        let backend = store.backend().await.unwrap();
        backend
            .unlock_section(0, "WED-T0000".into(), OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(store.refresh().await.unwrap());
        assert!(!store.refresh().await.unwrap());
    }

    #[tokio::test]
    async fn slow_refresh_never_rolls_back_a_concurrent_unlock() {
        let dir = std::env::temp_dir().join(format!("photo-reveal-stall-{}", Uuid::new_v4()));
        let backend = Arc::new(StallingStore {
            inner: LocalGameStore::open(dir).await.unwrap(),
            stall_next_load: AtomicBool::new(false),
            read_done: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        });
        let store = Arc::new(StateStore::with_backend(backend.clone()));
        let saved = store
            .save("https://example.com/p.jpg".into(), sections(2))
            .await
            .unwrap();
        let mut subscription = store.subscribe().await.unwrap();
        assert_eq!(subscription.next().await.unwrap().unwrap().unlocked_count(), 0);

        backend.stall_next_load.store(true, Ordering::SeqCst);
        let refresh = tokio::spawn({
            let store = store.clone();
            async move { store.refresh().await }
        });
        backend.read_done.notified().await;

        let unlock = tokio::spawn({
            let store = store.clone();
            let board = saved.sections.clone();
            async move { store.apply_unlock(0, &board).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        backend.release.notify_one();

        assert!(!refresh.await.unwrap().unwrap());
        assert!(unlock.await.unwrap().unwrap().is_some());

        let after_unlock = subscription.next().await.unwrap().unwrap();
        assert_eq!(after_unlock.unlocked_count(), 1);
        let later = tokio::time::timeout(Duration::from_millis(100), subscription.next()).await;
        assert!(later.is_err(), "no further snapshot expected");

        assert!(!store.refresh().await.unwrap());
    }
}
