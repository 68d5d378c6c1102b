//! Role and champion assignment for one roll.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::{models::GamePlayerRollEntity, roll_store::RollStore, storage::StorageResult},
    state::game::{Champion, GamePlayer, Role, SLOT_COUNT},
};

/// Reasons a roll cannot be drafted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// `player_id` has no champion left to draw.
    #[error("no eligible champion left for player `{player_id}`")]
    EligibilityExhausted {
        /// Player whose pool ran dry.
        player_id: String,
    },
}

/// Result of a roll for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDraft {
    /// Assigned role.
    pub role: Role,
    /// `None` for unfilled slots.
    pub champion: Option<Champion>,
}

/// Role and champion for every slot of the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Per-slot results, in slot order.
    pub slots: [SlotDraft; SLOT_COUNT],
}

impl Draft {
    /// Rows to persist for this roll, one per occupied slot.
    pub fn roll_rows(
        &self,
        players: &[GamePlayer; SLOT_COUNT],
        game_id: Uuid,
        roll_number: u32,
    ) -> Vec<GamePlayerRollEntity> {
        players
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(slot, draft)| {
                let champion = draft.champion.as_ref()?;
                slot.is_occupied().then(|| GamePlayerRollEntity {
                    game_id,
                    player_id: slot.player.id.clone(),
                    roll_number,
                    role: draft.role.as_str().to_owned(),
                    champion_id: champion.id.clone(),
                })
            })
            .collect()
    }

    /// Write the draft into the lobby slots.
    pub fn apply(self, players: &mut [GamePlayer; SLOT_COUNT]) {
        for (slot, draft) in players.iter_mut().zip(self.slots) {
            slot.role = Some(draft.role);
            slot.champion = draft.champion;
        }
    }
}

/// Uniform permutation of the role set.
pub fn shuffled_roles<R: Rng + ?Sized>(rng: &mut R) -> [Role; SLOT_COUNT] {
    let mut roles = Role::ALL;
    roles.shuffle(rng);
    roles
}

/// Sample from `pool` until a champion absent from `taken` comes up.
///
/// Rejected candidates leave the pool, so this ends after at most
/// `pool.len()` draws.
pub fn pick_champion<R: Rng + ?Sized>(
    rng: &mut R,
    mut pool: Vec<Champion>,
    taken: &HashSet<String>,
) -> Option<Champion> {
    while !pool.is_empty() {
        let index = rng.random_range(0..pool.len());
        let candidate = pool.swap_remove(index);
        if !taken.contains(&candidate.id) {
            return Some(candidate);
        }
    }
    None
}

/// Assign a role to every slot and a distinct champion to every occupied one.
///
/// `pools` maps player ids to their eligibility pool. A player whose pool is
/// missing, empty or fully taken aborts the whole draft.
pub fn draft<R: Rng + ?Sized>(
    rng: &mut R,
    players: &[GamePlayer; SLOT_COUNT],
    pools: &HashMap<String, Vec<Champion>>,
) -> Result<Draft, DraftError> {
    let roles = shuffled_roles(rng);
    let mut taken = HashSet::new();
    let mut champions: [Option<Champion>; SLOT_COUNT] = Default::default();

    for (index, slot) in players.iter().enumerate() {
        if !slot.is_occupied() {
            continue;
        }
        let pool = pools.get(&slot.player.id).cloned().unwrap_or_default();
        let champion = pick_champion(rng, pool, &taken).ok_or_else(|| {
            DraftError::EligibilityExhausted {
                player_id: slot.player.id.clone(),
            }
        })?;
        taken.insert(champion.id.clone());
        champions[index] = Some(champion);
    }

    let mut champions = champions.into_iter();
    let slots = roles.map(|role| SlotDraft {
        role,
        champion: champions.next().flatten(),
    });
    Ok(Draft { slots })
}

/// Champions `player_id` may draw: the owned set when it is non-empty,
/// otherwise the weekly free rotation (merged with the full catalogue when
/// `fallback_to_all` is set).
pub async fn eligibility_pool(
    store: &dyn RollStore,
    player_id: &str,
    fallback_to_all: bool,
) -> StorageResult<Vec<Champion>> {
    let owned = store.champions_owned_by(player_id.to_owned()).await?;
    if !owned.is_empty() {
        return Ok(owned.into_iter().map(Into::into).collect());
    }

    let mut pool = IndexMap::new();
    if fallback_to_all {
        for champion in store.all_champions().await? {
            pool.insert(champion.id.clone(), champion);
        }
    }
    for champion in store.weekly_free_champions().await? {
        pool.entry(champion.id.clone()).or_insert(champion);
    }
    Ok(pool.into_values().map(Into::into).collect())
}
