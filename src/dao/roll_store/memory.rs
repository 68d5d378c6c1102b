use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RollStore;
use crate::dao::{
    models::{ChampionEntity, GameEntity, GamePlayerEntity, GamePlayerRollEntity, PlayerEntity},
    storage::{StorageError, StorageResult},
};

#[derive(Debug, Error)]
#[error("in-memory store is offline")]
struct MemoryStoreOffline;

#[derive(Debug, Error)]
#[error("injected failure on {0:?}")]
struct InjectedFault(FailPoint);

/// Write calls that can be made to fail once with [`MemoryRollStore::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// [`RollStore::create_game`].
    CreateGame,
    /// [`RollStore::create_game_players`].
    CreateGamePlayers,
    /// [`RollStore::create_game_player_rolls`].
    CreateGamePlayerRolls,
    /// [`RollStore::delete_roll`].
    DeleteRoll,
    /// [`RollStore::delete_game_cascade`].
    DeleteGameCascade,
}

/// When an injected failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Nothing is written.
    BeforeWrite,
    /// The write lands but the caller still sees an error, as with a lost
    /// acknowledgement.
    AfterWrite,
}

fn injected(point: FailPoint) -> StorageError {
    StorageError::unavailable(format!("injected failure on {point:?}"), InjectedFault(point))
}

#[derive(Default)]
struct Tables {
    players: IndexMap<String, PlayerEntity>,
    champions: IndexMap<String, ChampionEntity>,
    player_champions: HashMap<String, Vec<String>>,
    weekly_free: Vec<String>,
    league_version: Option<String>,
    games: IndexMap<Uuid, GameEntity>,
    game_players: Vec<GamePlayerEntity>,
    rolls: Vec<GamePlayerRollEntity>,
}

impl Tables {
    fn lookup(&self, ids: &[String]) -> Vec<ChampionEntity> {
        ids.iter()
            .filter_map(|id| self.champions.get(id).cloned())
            .collect()
    }
}

/// Process-local [`RollStore`] with the same constraints as the database
/// backends. Its contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryRollStore {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
    failures: Arc<DashMap<FailPoint, InjectedFailure>>,
}

impl MemoryRollStore {
    /// Empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every call fails as unavailable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the next call hitting `point` fail as described by `failure`.
    pub fn fail_next(&self, point: FailPoint, failure: InjectedFailure) {
        self.failures.insert(point, failure);
    }

    /// Every stored player profile.
    pub async fn players(&self) -> Vec<PlayerEntity> {
        self.tables.read().await.players.values().cloned().collect()
    }

    /// Every stored game, oldest first.
    pub async fn games(&self) -> Vec<GameEntity> {
        self.tables.read().await.games.values().cloned().collect()
    }

    /// Participants recorded for `game_id`.
    pub async fn game_players(&self, game_id: Uuid) -> Vec<GamePlayerEntity> {
        let tables = self.tables.read().await;
        tables
            .game_players
            .iter()
            .filter(|entry| entry.game_id == game_id)
            .cloned()
            .collect()
    }

    /// Roll rows recorded for `game_id`, across every roll number.
    pub async fn rolls(&self, game_id: Uuid) -> Vec<GamePlayerRollEntity> {
        let tables = self.tables.read().await;
        tables
            .rolls
            .iter()
            .filter(|roll| roll.game_id == game_id)
            .cloned()
            .collect()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store offline".into(),
                MemoryStoreOffline,
            ));
        }
        Ok(())
    }

    /// Consume the failure armed for `point`. Returns whether the caller must
    /// fail after writing.
    fn take_failure(&self, point: FailPoint) -> StorageResult<bool> {
        match self.failures.remove(&point).map(|(_, failure)| failure) {
            Some(InjectedFailure::BeforeWrite) => Err(injected(point)),
            Some(InjectedFailure::AfterWrite) => Ok(true),
            None => Ok(false),
        }
    }
}

impl RollStore for MemoryRollStore {
    fn upsert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.tables.write().await;
            tables.players.insert(player.id.clone(), player);
            Ok(())
        })
    }

    fn latest_league_version(&self) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.tables.read().await.league_version.clone())
        })
    }

    fn champions_owned_by(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.tables.read().await;
            Ok(tables
                .player_champions
                .get(&player_id)
                .map(|ids| tables.lookup(ids))
                .unwrap_or_default())
        })
    }

    fn all_champions(&self) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.tables.read().await.champions.values().cloned().collect())
        })
    }

    fn weekly_free_champions(&self) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.tables.read().await;
            Ok(tables.lookup(&tables.weekly_free))
        })
    }

    fn create_game(&self) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let fail_after = store.take_failure(FailPoint::CreateGame)?;
            let game = GameEntity::new();
            store.tables.write().await.games.insert(game.id, game.clone());
            if fail_after {
                return Err(injected(FailPoint::CreateGame));
            }
            Ok(game)
        })
    }

    fn create_game_players(
        &self,
        players: Vec<GamePlayerEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let fail_after = store.take_failure(FailPoint::CreateGamePlayers)?;
            let mut tables = store.tables.write().await;
            let mut seen: HashSet<GamePlayerEntity> = tables.game_players.iter().cloned().collect();
            for entry in &players {
                if !seen.insert(entry.clone()) {
                    return Err(StorageError::Conflict(format!(
                        "player `{}` already recorded for game `{}`",
                        entry.player_id, entry.game_id
                    )));
                }
            }
            tables.game_players.extend(players);
            if fail_after {
                return Err(injected(FailPoint::CreateGamePlayers));
            }
            Ok(())
        })
    }

    fn create_game_player_rolls(
        &self,
        rolls: Vec<GamePlayerRollEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let fail_after = store.take_failure(FailPoint::CreateGamePlayerRolls)?;
            let mut tables = store.tables.write().await;
            let mut keys: HashSet<(Uuid, String, u32)> = tables
                .rolls
                .iter()
                .map(|roll| (roll.game_id, roll.player_id.clone(), roll.roll_number))
                .collect();
            for roll in &rolls {
                if !keys.insert((roll.game_id, roll.player_id.clone(), roll.roll_number)) {
                    return Err(StorageError::Conflict(format!(
                        "roll {} of player `{}` already recorded for game `{}`",
                        roll.roll_number, roll.player_id, roll.game_id
                    )));
                }
            }
            tables.rolls.extend(rolls);
            if fail_after {
                return Err(injected(FailPoint::CreateGamePlayerRolls));
            }
            Ok(())
        })
    }

    fn delete_roll(&self, game_id: Uuid, roll_number: u32) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let fail_after = store.take_failure(FailPoint::DeleteRoll)?;
            store
                .tables
                .write()
                .await
                .rolls
                .retain(|roll| roll.game_id != game_id || roll.roll_number != roll_number);
            if fail_after {
                return Err(injected(FailPoint::DeleteRoll));
            }
            Ok(())
        })
    }

    fn delete_game_cascade(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let fail_after = store.take_failure(FailPoint::DeleteGameCascade)?;
            let mut tables = store.tables.write().await;
            tables.rolls.retain(|roll| roll.game_id != game_id);
            tables.game_players.retain(|entry| entry.game_id != game_id);
            tables.games.shift_remove(&game_id);
            if fail_after {
                return Err(injected(FailPoint::DeleteGameCascade));
            }
            Ok(())
        })
    }

    fn replace_league_version(&self, version: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.tables.write().await.league_version = Some(version);
            Ok(())
        })
    }

    fn upsert_champions(
        &self,
        champions: Vec<ChampionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.tables.write().await;
            for champion in champions {
                tables.champions.insert(champion.id.clone(), champion);
            }
            Ok(())
        })
    }

    fn replace_weekly_free_champions(
        &self,
        champion_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.tables.write().await.weekly_free = champion_ids;
            Ok(())
        })
    }

    fn set_player_champions(
        &self,
        player_id: String,
        champion_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut tables = store.tables.write().await;
            if champion_ids.is_empty() {
                tables.player_champions.remove(&player_id);
            } else {
                tables.player_champions.insert(player_id, champion_ids);
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn champion(id: &str) -> ChampionEntity {
        ChampionEntity {
            id: id.into(),
            name: format!("champion {id}"),
            image: format!("{id}.png"),
        }
    }

    #[tokio::test]
    async fn owned_and_weekly_pools_resolve_against_catalogue() {
        let store = MemoryRollStore::new();
        store
            .upsert_champions(vec![champion("1"), champion("2"), champion("3")])
            .await
            .unwrap();
        store
            .set_player_champions("p1".into(), vec!["1".into(), "99".into()])
            .await
            .unwrap();
        store
            .replace_weekly_free_champions(vec!["3".into()])
            .await
            .unwrap();

        let owned = store.champions_owned_by("p1".into()).await.unwrap();
        assert_eq!(owned, vec![champion("1")]);
        assert!(store.champions_owned_by("p2".into()).await.unwrap().is_empty());
        assert_eq!(
            store.weekly_free_champions().await.unwrap(),
            vec![champion("3")]
        );
    }

    #[tokio::test]
    async fn duplicate_roll_rows_are_conflicts() {
        let store = MemoryRollStore::new();
        let game = store.create_game().await.unwrap();
        let roll = GamePlayerRollEntity {
            game_id: game.id,
            player_id: "p1".into(),
            roll_number: 1,
            role: "TOP".into(),
            champion_id: "1".into(),
        };
        store
            .create_game_player_rolls(vec![roll.clone()])
            .await
            .unwrap();
        let err = store
            .create_game_player_rolls(vec![roll])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(store.rolls(game.id).await.len(), 1);
    }

    #[tokio::test]
    async fn cascade_delete_only_touches_one_game() {
        let store = MemoryRollStore::new();
        let kept = store.create_game().await.unwrap();
        let dropped = store.create_game().await.unwrap();
        for game_id in [kept.id, dropped.id] {
            store
                .create_game_players(vec![GamePlayerEntity {
                    game_id,
                    player_id: "p1".into(),
                }])
                .await
                .unwrap();
            store
                .create_game_player_rolls(vec![GamePlayerRollEntity {
                    game_id,
                    player_id: "p1".into(),
                    roll_number: 1,
                    role: "MID".into(),
                    champion_id: "1".into(),
                }])
                .await
                .unwrap();
        }

        store.delete_game_cascade(dropped.id).await.unwrap();

        assert_eq!(store.games().await, vec![kept.clone()]);
        assert!(store.rolls(dropped.id).await.is_empty());
        assert!(store.game_players(dropped.id).await.is_empty());
        assert_eq!(store.rolls(kept.id).await.len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let store = MemoryRollStore::new();
        let game = store.create_game().await.unwrap();
        let roll = |roll_number| GamePlayerRollEntity {
            game_id: game.id,
            player_id: "p1".into(),
            roll_number,
            role: "TOP".into(),
            champion_id: "1".into(),
        };

        store.fail_next(FailPoint::CreateGamePlayerRolls, InjectedFailure::BeforeWrite);
        assert!(store.create_game_player_rolls(vec![roll(1)]).await.is_err());
        assert!(store.rolls(game.id).await.is_empty());

        store.fail_next(FailPoint::CreateGamePlayerRolls, InjectedFailure::AfterWrite);
        assert!(store.create_game_player_rolls(vec![roll(1)]).await.is_err());
        assert_eq!(store.rolls(game.id).await.len(), 1);

        store.create_game_player_rolls(vec![roll(2)]).await.unwrap();
        assert_eq!(store.rolls(game.id).await.len(), 2);
    }

    #[tokio::test]
    async fn delete_roll_keeps_other_roll_numbers() {
        let store = MemoryRollStore::new();
        let game = store.create_game().await.unwrap();
        let rows = (1..=2)
            .flat_map(|roll_number| {
                ["p1", "p2"].map(|player_id| GamePlayerRollEntity {
                    game_id: game.id,
                    player_id: player_id.into(),
                    roll_number,
                    role: "MID".into(),
                    champion_id: format!("{player_id}-{roll_number}"),
                })
            })
            .collect();
        store.create_game_player_rolls(rows).await.unwrap();

        store.delete_roll(game.id, 2).await.unwrap();
        let left = store.rolls(game.id).await;
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|roll| roll.roll_number == 1));
        store.delete_roll(game.id, 7).await.unwrap();
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryRollStore::new();
        store.set_offline(true);
        assert!(store.health_check().await.is_err());
        assert!(store.latest_league_version().await.is_err());
        store.set_offline(false);
        assert_eq!(store.latest_league_version().await.unwrap(), None);
    }
}
