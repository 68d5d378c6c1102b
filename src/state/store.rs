//! Lock-guarded home of the lobby state with invariant-checked commits.

use std::future::Future;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::error;

use crate::state::game::{GameState, InvariantViolation};

/// Single source of truth for the lobby [`GameState`].
///
/// Readers get copies; writers work on a scratch copy that only replaces the
/// canonical value once it is complete and passes [`GameState::check_invariants`].
pub struct GameStateStore {
    state: RwLock<GameState>,
}

impl GameStateStore {
    /// Store seeded with `initial`. Invariants are not checked here.
    pub fn new(initial: GameState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Copy of the current state. The read lock is released before returning.
    pub async fn snapshot(&self) -> GameState {
        self.state.read().await.clone()
    }

    /// Hold the read lock, e.g. to register a viewer without missing an update.
    pub async fn read(&self) -> RwLockReadGuard<'_, GameState> {
        self.state.read().await
    }

    /// Apply an infallible in-place mutation and return the committed state.
    pub async fn mutate<F, T>(&self, f: F) -> (T, GameState)
    where
        F: FnOnce(&mut GameState) -> T,
    {
        let mut guard = self.state.write().await;
        let value = f(&mut *guard);
        if let Err(violation) = guard.check_invariants() {
            error!(error = %violation, "state invariant broken by infallible mutation");
        }
        (value, guard.clone())
    }

    /// Run `f` on a scratch copy; commit only when it succeeds and the result
    /// keeps every invariant.
    pub async fn try_mutate<F, T, E>(&self, f: F) -> Result<(T, GameState), E>
    where
        F: FnOnce(&mut GameState) -> Result<T, E>,
        E: From<InvariantViolation>,
    {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let value = f(&mut next)?;
        next.check_invariants()?;
        *guard = next;
        Ok((value, guard.clone()))
    }

    /// Asynchronous variant of [`Self::try_mutate`] holding the write lock for
    /// the whole unit of work, so persistence calls made by `f` are linearized
    /// with every other mutation.
    pub async fn transact<F, Fut, T, E>(&self, f: F) -> Result<(T, GameState), E>
    where
        F: FnOnce(GameState) -> Fut,
        Fut: Future<Output = Result<(GameState, T), E>>,
        E: From<InvariantViolation>,
    {
        let mut guard = self.state.write().await;
        let (next, value) = f(guard.clone()).await?;
        next.check_invariants()?;
        *guard = next;
        Ok((value, guard.clone()))
    }
}

impl Default for GameStateStore {
    fn default() -> Self {
        Self::new(GameState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Invariant(InvariantViolation),
        Aborted,
    }

    impl From<InvariantViolation> for TestError {
        fn from(value: InvariantViolation) -> Self {
            TestError::Invariant(value)
        }
    }

    #[tokio::test]
    async fn try_mutate_discards_failed_work() {
        let store = GameStateStore::default();
        let result: Result<((), GameState), TestError> = store
            .try_mutate(|state| {
                state.next_roll_timer_ms = 42;
                Err(TestError::Aborted)
            })
            .await;
        assert_eq!(result.unwrap_err(), TestError::Aborted);
        assert_eq!(store.snapshot().await.next_roll_timer_ms, 0);
    }

    #[tokio::test]
    async fn try_mutate_refuses_invariant_violations() {
        let store = GameStateStore::default();
        let result: Result<((), GameState), TestError> = store
            .try_mutate(|state| {
                state.game_in_progress = true;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(TestError::Invariant(_))));
        assert!(!store.snapshot().await.game_in_progress);
    }

    #[tokio::test]
    async fn transact_commits_returned_state() {
        let store = GameStateStore::default();
        let (value, committed) = store
            .transact(|mut state| async move {
                state.roll_count = 1;
                state.game_in_progress = true;
                Ok::<_, TestError>((state, "done"))
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(committed.roll_count, 1);
        assert_eq!(store.snapshot().await, committed);
    }

    #[tokio::test]
    async fn transact_keeps_previous_state_on_error() {
        let store = GameStateStore::default();
        let before = store.snapshot().await;
        let result = store
            .transact(|mut state| async move {
                state.roll_count = 9;
                if state.roll_count > 0 {
                    return Err(TestError::Aborted);
                }
                Ok((state, ()))
            })
            .await;
        assert_eq!(result.unwrap_err(), TestError::Aborted);
        assert_eq!(store.snapshot().await, before);
    }
}
