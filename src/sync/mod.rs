//! Client sync loop: keeps one view of the game in step with the store and
//! resolves the code a guest arrived with.
//!
//! Every change reaches the view through the store subscription, including
//! the unlock this loop performs itself.

pub mod entry;

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::ServiceError,
    services::game_service,
    state::{
        game::{GameState, UnlockOutcome},
        store::{StateStore, Subscription},
    },
};

use self::entry::{EntryUrl, Navigator};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1_000);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(800);

/// Tunables of a [`ClientSync`].
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Minimum time spent in [`SyncPhase::Verifying`] before the unlock runs.
    pub verify_delay: Duration,
    /// First retry delay after a store failure; doubles up to [`MAX_RETRY_DELAY`].
    pub retry_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            verify_delay: DEFAULT_VERIFY_DELAY,
            retry_delay: INITIAL_RETRY_DELAY,
        }
    }
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            verify_delay: config.verify_delay,
            ..Self::default()
        }
    }
}

/// Where the guest-facing flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// An entry code is being checked.
    Verifying,
    /// The entry code was checked; shown until dismissed.
    Resolved(UnlockOutcome),
    /// Plain dashboard.
    Idle,
}

/// Everything a client renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientView {
    /// Current phase.
    pub phase: SyncPhase,
    /// Latest store snapshot; `None` while no game exists.
    pub game: Option<Arc<GameState>>,
    /// Set once the first snapshot arrived.
    pub loaded: bool,
    /// Last store failure, cleared by the next success.
    pub error: Option<String>,
}

#[derive(Debug)]
enum Command {
    Dismiss,
}

/// Handle on a running sync loop. Dropping it stops the loop.
pub struct ClientSync {
    view: watch::Receiver<ClientView>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ClientSync {
    /// Read the entry location once, clean it, and start following the store.
    pub fn start(
        store: Arc<StateStore>,
        navigator: Arc<dyn Navigator>,
        options: SyncOptions,
    ) -> Self {
        let pending = take_entry_code(navigator.as_ref());
        let (view_tx, view_rx) = watch::channel(ClientView {
            phase: if pending.is_some() {
                SyncPhase::Verifying
            } else {
                SyncPhase::Idle
            },
            game: None,
            loaded: false,
            error: None,
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(sync_loop(store, pending, options, view_tx, command_rx));

        Self {
            view: view_rx,
            commands: command_tx,
            task: Some(task),
        }
    }

    /// Receiver following every view update.
    pub fn view(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    /// Copy of the latest view.
    pub fn current(&self) -> ClientView {
        self.view.borrow().clone()
    }

    /// Close the resolved notice and return to [`SyncPhase::Idle`].
    pub fn dismiss(&self) {
        let _ = self.commands.send(Command::Dismiss);
    }

    /// Wait until the entry code is resolved. `None` when there was no code
    /// or the loop stopped first.
    pub async fn resolved(&self) -> Option<UnlockOutcome> {
        let mut view = self.view.clone();
        let phase = view
            .wait_for(|view| view.phase != SyncPhase::Verifying)
            .await
            .ok()?
            .phase;
        match phase {
            SyncPhase::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }
}

impl Drop for ClientSync {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Pull the code out of the entry location and replace it with the clean
/// URL, so a reload does not submit the code again.
fn take_entry_code(navigator: &dyn Navigator) -> Option<String> {
    let location = navigator.location();
    let entry = match EntryUrl::parse(&location) {
        Ok(entry) => entry,
        Err(err) => {
            warn!(%location, error = %err, "unparseable entry location");
            return None;
        }
    };

    let code = entry.code()?;
    navigator.replace(entry.without_code());
    Some(code)
}

type Resolution = BoxFuture<'static, Result<UnlockOutcome, ServiceError>>;

fn resolve_after(store: Arc<StateStore>, code: String, delay: Duration) -> Resolution {
    Box::pin(async move {
        sleep(delay).await;
        game_service::unlock_by_code(&store, &code).await
    })
}

async fn next_resolution(slot: &mut Option<Resolution>) -> Result<UnlockOutcome, ServiceError> {
    match slot {
        Some(resolution) => resolution.await,
        None => std::future::pending().await,
    }
}

async fn subscribe_with_retry(
    store: &StateStore,
    options: &SyncOptions,
    view: &watch::Sender<ClientView>,
) -> Subscription {
    let mut delay = options.retry_delay;
    loop {
        match store.subscribe().await {
            Ok(subscription) => return subscription,
            Err(err) => {
                warn!(error = %err, "store subscription failed; retrying");
                view.send_modify(|current| current.error = Some(err.to_string()));
                sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }
}

async fn sync_loop(
    store: Arc<StateStore>,
    mut pending: Option<String>,
    options: SyncOptions,
    view: watch::Sender<ClientView>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut subscription = subscribe_with_retry(&store, &options, &view).await;
    let mut resolution: Option<Resolution> = None;
    let mut code = None;
    let mut retry_delay = options.retry_delay;

    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else {
                    debug!("store dropped; stopping client sync");
                    break;
                };
                let first = !view.borrow().loaded;
                view.send_modify(|current| {
                    current.game = snapshot;
                    current.loaded = true;
                    current.error = None;
                });
                // Resolution waits for the first snapshot.
                if first {
                    if let Some(entry_code) = pending.take() {
                        resolution = Some(resolve_after(
                            store.clone(),
                            entry_code.clone(),
                            options.verify_delay,
                        ));
                        code = Some(entry_code);
                    }
                }
            }
            result = next_resolution(&mut resolution) => {
                resolution = None;
                match result {
                    Ok(outcome) => {
                        info!(?outcome, "entry code resolved");
                        code = None;
                        retry_delay = options.retry_delay;
                        view.send_modify(|current| {
                            current.phase = SyncPhase::Resolved(outcome);
                            current.error = None;
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "entry code resolution failed; retrying");
                        view.send_modify(|current| current.error = Some(err.to_string()));
                        if let Some(entry_code) = code.clone() {
                            resolution = Some(resolve_after(store.clone(), entry_code, retry_delay));
                            retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                        }
                    }
                }
            }
            command = commands.recv() => match command {
                Some(Command::Dismiss) => {
                    view.send_if_modified(|current| {
                        if matches!(current.phase, SyncPhase::Resolved(_)) {
                            current.phase = SyncPhase::Idle;
                            true
                        } else {
                            false
                        }
                    });
                }
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        dao::game_store::local::LocalGameStore,
        state::game::Section,
        sync::entry::MemoryNavigator,
    };
    use uuid::Uuid;

    fn fast() -> SyncOptions {
        SyncOptions {
            verify_delay: Duration::from_millis(30),
            retry_delay: Duration::from_millis(10),
        }
    }

    async fn store_with_board() -> Arc<StateStore> {
        let dir = std::env::temp_dir().join(format!("photo-reveal-sync-{}", Uuid::new_v4()));
        let store = Arc::new(StateStore::with_backend(Arc::new(
            LocalGameStore::open(dir).await.unwrap(),
        )));
        let sections = (0..4)
            .map(|id| Section {
                id,
                code: if id == 2 {
                    "WED-ABCDE".into()
                } else {
                    format!("WED-0000{id}")
                },
                is_unlocked: false,
                row: id / 2,
                col: id % 2,
            })
            .collect();
        store
            .save("https://example.com/p.jpg".into(), sections)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn entry_code_is_verified_then_resolved_and_url_cleaned() {
        let store = store_with_board().await;
        let navigator = Arc::new(MemoryNavigator::new("/?code=WED-ABCDE&lang=fr"));
        let started = Instant::now();

        let sync = ClientSync::start(store.clone(), navigator.clone(), fast());
        assert_eq!(sync.current().phase, SyncPhase::Verifying);
        assert_eq!(navigator.location(), "/?lang=fr");

        assert_eq!(sync.resolved().await, Some(UnlockOutcome::NewlyUnlocked(2)));
        assert!(started.elapsed() >= fast().verify_delay);

        let mut view = sync.view();
        let game = view
            .wait_for(|view| {
                view.game
                    .as_ref()
                    .is_some_and(|game| game.sections[2].is_unlocked)
            })
            .await
            .unwrap()
            .game
            .clone()
            .unwrap();
        assert_eq!(game.unlocked_count(), 1);

        // Reloading the clean URL does not verify again.
        let reload = ClientSync::start(store, navigator.clone(), fast());
        assert_eq!(reload.current().phase, SyncPhase::Idle);
        assert_eq!(reload.resolved().await, None);
        assert_eq!(navigator.location(), "/?lang=fr");
    }

    #[tokio::test]
    async fn repeat_visit_reports_already_unlocked_and_dismisses() {
        let store = store_with_board().await;
        game_service::unlock_by_code(&store, "WED-ABCDE")
            .await
            .unwrap();

        let navigator = Arc::new(MemoryNavigator::new("/?code=WED-ABCDE"));
        let sync = ClientSync::start(store, navigator, fast());
        assert_eq!(
            sync.resolved().await,
            Some(UnlockOutcome::AlreadyUnlocked(2))
        );

        sync.dismiss();
        let mut view = sync.view();
        view.wait_for(|view| view.phase == SyncPhase::Idle)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_board_resolves_to_not_found() {
        let dir = std::env::temp_dir().join(format!("photo-reveal-sync-{}", Uuid::new_v4()));
        let store = Arc::new(StateStore::with_backend(Arc::new(
            LocalGameStore::open(dir).await.unwrap(),
        )));
        let navigator = Arc::new(MemoryNavigator::new("/?code=WED-ABCDE"));

        let sync = ClientSync::start(store, navigator, fast());
        assert_eq!(sync.resolved().await, Some(UnlockOutcome::NotFound));
        assert!(sync.current().loaded);
        assert!(sync.current().game.is_none());
    }

    #[tokio::test]
    async fn detached_store_reports_error_and_keeps_verifying() {
        let store = Arc::new(StateStore::default());
        let navigator = Arc::new(MemoryNavigator::new("/?code=WED-ABCDE"));

        let sync = ClientSync::start(store.clone(), navigator, fast());
        let mut view = sync.view();
        view.wait_for(|view| view.error.is_some()).await.unwrap();
        assert_eq!(sync.current().phase, SyncPhase::Verifying);

        // Once a backend shows up the loop recovers on its own.
        let dir = std::env::temp_dir().join(format!("photo-reveal-sync-{}", Uuid::new_v4()));
        store
            .install(Arc::new(LocalGameStore::open(dir).await.unwrap()))
            .await;
        assert_eq!(sync.resolved().await, Some(UnlockOutcome::NotFound));
        assert!(sync.current().error.is_none());
    }
}
