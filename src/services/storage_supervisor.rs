use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{roll_store::RollStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the roll store and keep the lobby in degraded mode while it is unreachable.
///
/// Runs for the lifetime of the process: after a connection is lost for good a
/// fresh one is built through `connect`.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RollStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_roll_store(store.clone()).await;
                info!("roll store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_store(&state, store.as_ref()).await;
                warn!("roll store lost; building a new connection");
            }
            Err(err) => {
                warn!(error = %err, "roll store connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it fails and cannot be revived.
async fn watch_store(state: &SharedState, store: &dyn RollStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("roll store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "roll store health check failed");
                if !recover(state, store).await {
                    warn!("exhausted roll store reconnect attempts; staying in degraded mode");
                    return;
                }
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Retry `try_reconnect` with backoff. The lobby enters degraded mode after
/// the first failed attempt and leaves it once an attempt succeeds.
async fn recover(state: &SharedState, store: &dyn RollStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "roll store reconnected after health check failure");
                state.update_degraded(false);
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "roll store reconnect failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "roll store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::roll_store::MemoryRollStore, state::AppState};

    #[tokio::test]
    async fn first_successful_reconnect_keeps_service_up() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRollStore::new();
        state.set_roll_store(Arc::new(store.clone())).await;

        assert!(recover(&state, &store).await);
        assert!(!state.is_degraded());
    }

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        let mut watcher = state.degraded_watcher();

        state.set_roll_store(Arc::new(MemoryRollStore::new())).await;

        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_roll_store().await.is_ok());
    }
}
