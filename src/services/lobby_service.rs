//! Viewer action dispatcher: validates each action against the lobby phase,
//! runs it under the lobby write lock and publishes the outcome.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use indexmap::IndexMap;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dao::{models::GamePlayerEntity, roll_store::RollStore},
    dto::ws::{ClientAction, SlotRequest},
    error::ServiceError,
    presence::PresenceSource,
    services::{
        draft::{draft, eligibility_pool},
        roster, state_events,
    },
    state::{
        SharedState,
        game::{AvailablePlayer, GamePlayer, GameState, SLOT_COUNT, fixed_slots},
        hub::ConnectionId,
        phase::{LobbyEvent, LobbyPhase, transition},
    },
};

/// Period of the roll countdown.
pub const TIMER_TICK: Duration = Duration::from_secs(1);

/// Run `action` for the viewer `origin` and publish the result.
///
/// Success is broadcast to every viewer; a rejection or failure leaves the
/// lobby untouched and echoes its state to `origin` only.
pub async fn handle_action(state: &SharedState, origin: ConnectionId, action: ClientAction) {
    let name = action.name();
    let outcome = match action {
        ClientAction::UpdatePlayers(entries) => update_roster(state, entries).await,
        ClientAction::Roll => roll(state).await,
        ClientAction::Cancel => cancel(state).await,
        ClientAction::Reset => reset(state).await,
        ClientAction::RefreshDiscord => refresh_roster(state).await,
    };

    match outcome {
        Ok(()) => {
            state_events::broadcast_state(state).await;
        }
        Err(err) => {
            match &err {
                ServiceError::Rejected(_) => info!(action = name, error = %err, "action rejected"),
                err if err.is_upstream() => warn!(action = name, error = %err, "action aborted"),
                _ => error!(action = name, error = %err, "action aborted"),
            }
            state_events::send_state_to(state, &origin).await;
        }
    }
}

/// Rebuild the five slots from a viewer's list, looked up against the
/// available players. Only allowed while idle.
pub async fn update_roster(
    state: &SharedState,
    entries: Vec<SlotRequest>,
) -> Result<(), ServiceError> {
    state
        .lobby()
        .try_mutate(|lobby| {
            transition(LobbyPhase::of(lobby), LobbyEvent::UpdateRoster)?;
            lobby.players = slots_from_request(&lobby.available_players, entries);
            Ok::<_, ServiceError>(())
        })
        .await?;
    Ok(())
}

/// Map requested ids onto slots. Unknown ids become empty slots, repeated ids
/// keep their first occurrence, extra entries are dropped.
pub fn slots_from_request(
    available: &IndexMap<String, AvailablePlayer>,
    entries: Vec<SlotRequest>,
) -> [GamePlayer; SLOT_COUNT] {
    let mut seen = HashSet::new();
    let mut slots = Vec::with_capacity(SLOT_COUNT);

    for entry in entries {
        if !entry.id.is_empty() && !seen.insert(entry.id.clone()) {
            warn!(player_id = %entry.id, "duplicate roster entry dropped");
            continue;
        }
        if slots.len() == SLOT_COUNT {
            warn!("roster entries beyond five dropped");
            break;
        }
        let slot = match available.get(&entry.id) {
            Some(player) => GamePlayer::occupied(player.id.clone(), Some(player.name.clone())),
            None => {
                if !entry.id.is_empty() {
                    info!(player_id = %entry.id, "requested player not in the channel");
                }
                GamePlayer::empty()
            }
        };
        slots.push(slot);
    }

    fixed_slots(slots)
}

/// Draft roles and champions for the current slots and persist the roll.
pub async fn roll(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_roll_store().await?;
    let timer_ms = state.config().timer_ms;
    let fallback_to_all = state.config().fallback_to_all_champions;

    let (roll_number, committed) = state
        .lobby()
        .transact(|mut lobby| async move {
            if !lobby.can_roll {
                return Err(ServiceError::Rejected(
                    "rolling is locked until the lobby is reset".into(),
                ));
            }
            let pending = transition(LobbyPhase::of(&lobby), LobbyEvent::RollStarted)?;
            let first_roll = matches!(pending, LobbyPhase::RollPending { first_roll: true });

            if let Some(version) = store.latest_league_version().await? {
                lobby.league_version = version;
            }

            let mut pools = HashMap::new();
            for player_id in lobby.occupied_ids() {
                if pools.contains_key(&player_id) {
                    continue;
                }
                let pool = eligibility_pool(store.as_ref(), &player_id, fallback_to_all).await?;
                pools.insert(player_id, pool);
            }

            let drafted = {
                let mut rng = state.rng();
                draft(&mut *rng, &lobby.players, &pools)?
            };

            let game_id = match (first_roll, lobby.game_id) {
                (true, _) => open_game(store.as_ref(), &lobby).await?,
                (false, Some(game_id)) => game_id,
                (false, None) => {
                    return Err(ServiceError::Rejected(
                        "game in progress has no identifier".into(),
                    ));
                }
            };

            let roll_number = lobby.roll_count + 1;
            let rows = drafted.roll_rows(&lobby.players, game_id, roll_number);
            if let Err(err) = store.create_game_player_rolls(rows).await {
                if first_roll {
                    discard_game(store.as_ref(), game_id).await;
                } else {
                    discard_roll(store.as_ref(), game_id, roll_number).await;
                }
                return Err(err.into());
            }

            drafted.apply(&mut lobby.players);
            lobby.roll_count = roll_number;
            lobby.game_in_progress = true;
            lobby.can_roll = false;
            lobby.next_roll_timer_ms = timer_ms;
            lobby.game_id = Some(game_id);
            transition(pending, LobbyEvent::RollCommitted)?;

            Ok((lobby, roll_number))
        })
        .await?;

    info!(
        game_id = ?committed.game_id,
        roll_number,
        "roll committed"
    );
    Ok(())
}

/// Create the game record and its participants for a first roll.
async fn open_game(store: &dyn RollStore, lobby: &GameState) -> Result<Uuid, ServiceError> {
    let game = store.create_game().await?;
    let participants = lobby
        .occupied_ids()
        .into_iter()
        .map(|player_id| GamePlayerEntity {
            game_id: game.id,
            player_id,
        })
        .collect();

    if let Err(err) = store.create_game_players(participants).await {
        discard_game(store, game.id).await;
        return Err(err.into());
    }
    info!(game_id = %game.id, "game opened");
    Ok(game.id)
}

async fn discard_game(store: &dyn RollStore, game_id: Uuid) {
    if let Err(err) = store.delete_game_cascade(game_id).await {
        error!(%game_id, error = %err, "failed to discard partially recorded game");
    }
}

/// Drop rows a failed write may have left behind so the roll number stays free.
async fn discard_roll(store: &dyn RollStore, game_id: Uuid, roll_number: u32) {
    if let Err(err) = store.delete_roll(game_id, roll_number).await {
        error!(%game_id, roll_number, error = %err, "failed to discard partially recorded roll");
    }
}

/// Delete the current game and its rolls, then reset the lobby.
pub async fn cancel(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_roll_store().await?;

    state
        .lobby()
        .transact(|mut lobby| async move {
            transition(LobbyPhase::of(&lobby), LobbyEvent::Cancel)?;
            let version = store.latest_league_version().await?;

            if lobby.game_in_progress && lobby.roll_count > 0 {
                if let Some(game_id) = lobby.game_id {
                    store.delete_game_cascade(game_id).await?;
                    info!(%game_id, rolls = lobby.roll_count, "game cancelled");
                }
            }

            if let Some(version) = version {
                lobby.league_version = version;
            }
            lobby.reset_round();
            Ok::<_, ServiceError>((lobby, ()))
        })
        .await?;
    Ok(())
}

/// Close the current game, keeping its records, and unlock rolling.
pub async fn reset(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_roll_store().await?;

    state
        .lobby()
        .transact(|mut lobby| async move {
            transition(LobbyPhase::of(&lobby), LobbyEvent::Reset)?;
            if let Some(version) = store.latest_league_version().await? {
                lobby.league_version = version;
            }
            lobby.reset_round();
            Ok::<_, ServiceError>((lobby, ()))
        })
        .await?;
    Ok(())
}

/// Re-read the configured channel from the presence source and reconcile.
pub async fn refresh_roster(state: &SharedState) -> Result<(), ServiceError> {
    let snapshot = state.presence().configured_channel().await?;
    let phase = LobbyPhase::of(&state.lobby().snapshot().await);
    transition(phase, LobbyEvent::RefreshRoster)?;
    roster::apply_snapshot(state, snapshot).await;
    Ok(())
}

/// Count the roll timer down once per [`TIMER_TICK`] for the process lifetime.
pub async fn run_roll_timer(state: SharedState) {
    let mut ticker = interval(TIMER_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let step = TIMER_TICK.as_millis() as u64;

    loop {
        ticker.tick().await;
        tick_roll_timer(&state, step).await;
    }
}

/// Advance the roll timer by `step_ms`. Returns `false` without taking the
/// write lock when the timer has already run out.
pub async fn tick_roll_timer(state: &SharedState, step_ms: u64) -> bool {
    if state.lobby().read().await.next_roll_timer_ms == 0 {
        return false;
    }
    state.lobby().mutate(|lobby| lobby.tick(step_ms)).await;
    true
}
