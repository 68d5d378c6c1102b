/// Lobby state types and invariants.
pub mod game;
/// Viewer connection registry.
pub mod hub;
/// Lobby phase machine.
pub mod phase;
/// Guarded store of the lobby state.
pub mod store;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::roll_store::RollStore,
    error::ServiceError,
    presence::PresenceHub,
};

use self::{game::GameState, hub::ViewerHub, store::GameStateStore};

/// Reference-counted handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Capacity of the presence event channel per subscriber.
const PRESENCE_EVENT_CAPACITY: usize = 64;

/// Central application state: lobby store, viewer registry, storage handle
/// and presence hub. Built once in `main` and handed to every task.
pub struct AppState {
    config: AppConfig,
    roll_store: RwLock<Option<Arc<dyn RollStore>>>,
    degraded: watch::Sender<bool>,
    lobby: GameStateStore,
    viewers: ViewerHub,
    presence: PresenceHub,
    rng: Mutex<StdRng>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Same as [`AppState::new`] with an explicit random source, e.g. a seeded
    /// one for reproducible draws.
    pub fn with_rng(config: AppConfig, rng: StdRng) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let initial = GameState {
            guild_id: config.guild_id.clone(),
            channel_id: config.channel_id.clone(),
            ..GameState::default()
        };
        let presence = PresenceHub::new(
            config.guild_id.clone(),
            config.channel_id.clone(),
            PRESENCE_EVENT_CAPACITY,
        );

        Arc::new(Self {
            config,
            roll_store: RwLock::new(None),
            degraded: degraded_tx,
            lobby: GameStateStore::new(initial),
            viewers: ViewerHub::new(),
            presence,
            rng: Mutex::new(rng),
        })
    }

    /// Validated runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current roll store, if one is installed.
    pub async fn roll_store(&self) -> Option<Arc<dyn RollStore>> {
        let guard = self.roll_store.read().await;
        guard.as_ref().cloned()
    }

    /// Roll store for an action that cannot run without persistence.
    pub async fn require_roll_store(&self) -> Result<Arc<dyn RollStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.roll_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new roll store implementation and leave degraded mode.
    pub async fn set_roll_store(&self, store: Arc<dyn RollStore>) {
        {
            let mut guard = self.roll_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// The lobby state store.
    pub fn lobby(&self) -> &GameStateStore {
        &self.lobby
    }

    /// Registry of connected viewer sockets.
    pub fn viewers(&self) -> &ViewerHub {
        &self.viewers
    }

    /// Presence hub fed by the chat bridge.
    pub fn presence(&self) -> &PresenceHub {
        &self.presence
    }

    /// Random source used by the draft. Never held across an await point.
    pub fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
