pub mod game;
pub mod store;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::{config::AppConfig, dao::game_store::GameStore, error::ServiceError};

use self::{game::UnlockOutcome, store::StateStore};

/// How long an entry notice waits for the visitor's next dashboard load.
pub const VISIT_NOTICE_TTL: Duration = Duration::from_secs(60 * 60);
/// Upper bound on notices held at once; the oldest goes first.
pub const MAX_PENDING_VISITS: usize = 4096;

/// Handle to the application state shared by every route.
pub type SharedState = Arc<AppState>;

#[derive(Debug, Clone, Copy)]
struct PendingVisit {
    outcome: UnlockOutcome,
    recorded_at: Instant,
}

/// Central application state: the game store adapter, configuration and the
/// per-visitor notices left by entry-URL visits.
pub struct AppState {
    store: Arc<StateStore>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
    visits: DashMap<Uuid, PendingVisit>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: Arc::new(StateStore::default()),
            config,
            degraded: degraded_tx,
            visits: DashMap::new(),
        })
    }

    /// Build a state already bound to `backend`, out of degraded mode.
    pub fn with_backend(config: AppConfig, backend: Arc<dyn GameStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            store: Arc::new(StateStore::with_backend(backend)),
            config,
            degraded: degraded_tx,
            visits: DashMap::new(),
        })
    }

    /// Shared game store adapter.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Fail fast with [`ServiceError::Degraded`] when no backend is installed.
    pub async fn require_store(&self) -> Result<&Arc<StateStore>, ServiceError> {
        if self.store.is_attached().await {
            Ok(&self.store)
        } else {
            Err(ServiceError::Degraded)
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, backend: Arc<dyn GameStore>) {
        self.store.install(backend).await;
        self.update_degraded(false).await;
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        self.store.detach().await;
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Remember the outcome a visitor should see on their next dashboard load.
    pub fn record_visit(&self, visitor: Uuid, outcome: UnlockOutcome) {
        self.record_visit_at(visitor, outcome, Instant::now());
    }

    /// Pending notice for `visitor`, if any and not expired.
    pub fn visit_notice(&self, visitor: &Uuid) -> Option<UnlockOutcome> {
        self.visit_notice_at(visitor, Instant::now())
    }

    /// Drop the pending notice, returning whether there was one.
    pub fn dismiss_visit(&self, visitor: &Uuid) -> bool {
        self.visits.remove(visitor).is_some()
    }

    /// Number of notices currently held.
    pub fn pending_visits(&self) -> usize {
        self.visits.len()
    }

    fn record_visit_at(&self, visitor: Uuid, outcome: UnlockOutcome, now: Instant) {
        self.visits
            .retain(|_, pending| now.duration_since(pending.recorded_at) < VISIT_NOTICE_TTL);

        if self.visits.len() >= MAX_PENDING_VISITS && !self.visits.contains_key(&visitor) {
            let oldest = self
                .visits
                .iter()
                .min_by_key(|entry| entry.value().recorded_at)
                .map(|entry| *entry.key());
            if let Some(oldest) = oldest {
                debug!(%oldest, "visit notice table full; evicting oldest");
                self.visits.remove(&oldest);
            }
        }

        self.visits.insert(
            visitor,
            PendingVisit {
                outcome,
                recorded_at: now,
            },
        );
    }

    fn visit_notice_at(&self, visitor: &Uuid, now: Instant) -> Option<UnlockOutcome> {
        let pending = self.visits.get(visitor).map(|entry| *entry.value())?;
        if now.duration_since(pending.recorded_at) < VISIT_NOTICE_TTL {
            Some(pending.outcome)
        } else {
            self.visits.remove(visitor);
            None
        }
    }
}
