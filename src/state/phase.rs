use thiserror::Error;

use crate::state::game::GameState;

/// High-level phases the lobby can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// No game running; the roster can be edited.
    Idle,
    /// At least one roll has been committed for the current game.
    InProgress,
    /// A roll is being drafted and persisted.
    RollPending {
        /// Whether this roll opens a new game.
        first_roll: bool,
    },
}

impl LobbyPhase {
    /// Phase implied by a committed state.
    pub fn of(state: &GameState) -> Self {
        if state.game_in_progress {
            LobbyPhase::InProgress
        } else {
            LobbyPhase::Idle
        }
    }
}

/// Events that drive the lobby phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyEvent {
    /// Viewer rebuilt the slot list.
    UpdateRoster,
    /// A roll was accepted and is being drafted.
    RollStarted,
    /// The roll was persisted and applied.
    RollCommitted,
    /// The roll failed before it was applied.
    RollAborted,
    /// The current game was cancelled and its records deleted.
    Cancel,
    /// The current game was closed without deleting its records.
    Reset,
    /// The roster was re-read from the presence source.
    RefreshRoster,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the event was applied to.
    pub from: LobbyPhase,
    /// Rejected event.
    pub event: LobbyEvent,
}

/// Compute the phase reached by applying `event` from `from`.
pub fn transition(from: LobbyPhase, event: LobbyEvent) -> Result<LobbyPhase, InvalidTransition> {
    let next = match (from, event) {
        (LobbyPhase::Idle, LobbyEvent::UpdateRoster) => LobbyPhase::Idle,
        (LobbyPhase::Idle, LobbyEvent::RollStarted) => LobbyPhase::RollPending { first_roll: true },
        (LobbyPhase::InProgress, LobbyEvent::RollStarted) => {
            LobbyPhase::RollPending { first_roll: false }
        }
        (LobbyPhase::RollPending { .. }, LobbyEvent::RollCommitted) => LobbyPhase::InProgress,
        (LobbyPhase::RollPending { first_roll: true }, LobbyEvent::RollAborted) => LobbyPhase::Idle,
        (LobbyPhase::RollPending { first_roll: false }, LobbyEvent::RollAborted) => {
            LobbyPhase::InProgress
        }
        (LobbyPhase::Idle | LobbyPhase::InProgress, LobbyEvent::Cancel | LobbyEvent::Reset) => {
            LobbyPhase::Idle
        }
        (phase @ (LobbyPhase::Idle | LobbyPhase::InProgress), LobbyEvent::RefreshRoster) => phase,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}
