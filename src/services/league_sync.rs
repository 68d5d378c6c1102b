//! Periodic refresh of the league reference data: latest game version,
//! champion catalogue and weekly free rotation.

use std::{collections::HashMap, time::Duration};

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    config::LeagueDataConfig,
    dao::{models::ChampionEntity, roll_store::RollStore, storage::StorageError},
    state::SharedState,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const VERSION_PLACEHOLDER: &str = "{version}";

/// Failures of a league data refresh.
#[derive(Debug, Error)]
pub enum LeagueSyncError {
    /// HTTP client could not be built.
    #[error("failed to build HTTP client")]
    ClientBuilder {
        /// Client error.
        #[source]
        source: reqwest::Error,
    },
    /// HTTP request failed or answered an error status.
    #[error("request to `{url}` failed")]
    Request {
        /// Requested URL.
        url: String,
        /// Client error.
        #[source]
        source: reqwest::Error,
    },
    /// Version list was empty.
    #[error("version list is empty; latest version unknown")]
    NoVersion,
    /// Saving the data failed.
    #[error("storage error while saving league data: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Deserialize)]
struct CatalogueChampion {
    key: String,
    name: String,
    image: CatalogueImage,
}

#[derive(Debug, Deserialize)]
struct CatalogueImage {
    full: String,
}

/// Champion catalogue of one game version.
#[derive(Debug, Deserialize)]
pub struct ChampionCatalogue {
    data: HashMap<String, CatalogueChampion>,
}

impl ChampionCatalogue {
    /// Catalogue entries keyed by their numeric champion key.
    pub fn into_entities(self) -> Vec<ChampionEntity> {
        let mut champions: Vec<ChampionEntity> = self
            .data
            .into_values()
            .map(|champion| ChampionEntity {
                id: champion.key,
                name: champion.name,
                image: champion.image.full,
            })
            .collect();
        champions.sort_by(|a, b| a.id.cmp(&b.id));
        champions
    }
}

/// Current free-to-play rotation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionRotation {
    free_champion_ids: Vec<u64>,
}

impl ChampionRotation {
    /// Champion keys of the rotation.
    pub fn champion_ids(&self) -> Vec<String> {
        self.free_champion_ids.iter().map(u64::to_string).collect()
    }
}

/// HTTP client for the public league data endpoints.
#[derive(Clone)]
pub struct LeagueDataClient {
    client: Client,
    config: LeagueDataConfig,
}

impl LeagueDataClient {
    /// Client with the request timeout applied.
    pub fn new(config: LeagueDataConfig) -> Result<Self, LeagueSyncError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| LeagueSyncError::ClientBuilder { source })?;
        Ok(Self { client, config })
    }

    /// Endpoints in use.
    pub fn config(&self) -> &LeagueDataConfig {
        &self.config
    }

    /// Latest game version, i.e. the head of the published version list.
    pub async fn latest_version(&self) -> Result<String, LeagueSyncError> {
        let versions: Vec<String> = self.get_json(&self.config.versions_url).await?;
        versions.into_iter().next().ok_or(LeagueSyncError::NoVersion)
    }

    /// Champion catalogue of `version`.
    pub async fn champions(&self, version: &str) -> Result<ChampionCatalogue, LeagueSyncError> {
        let url = champions_url(&self.config.champions_url, version);
        self.get_json(&url).await
    }

    /// `None` when no API key is configured.
    pub async fn weekly_rotation(&self) -> Result<Option<ChampionRotation>, LeagueSyncError> {
        let Some(api_key) = self.config.riot_api_key.as_deref() else {
            return Ok(None);
        };
        let url = self.config.rotation_url.clone();
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| LeagueSyncError::Request {
                url: url.clone(),
                source,
            })?;
        let rotation = response
            .json::<ChampionRotation>()
            .await
            .map_err(|source| LeagueSyncError::Request { url, source })?;
        Ok(Some(rotation))
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, LeagueSyncError>
    where
        T: serde::de::DeserializeOwned,
    {
        let request_error = |source| LeagueSyncError::Request {
            url: url.to_owned(),
            source,
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_error)?
            .json::<T>()
            .await
            .map_err(request_error)
    }
}

fn champions_url(template: &str, version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, version)
}

/// Summary of one refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Version that was stored.
    pub version: String,
    /// Catalogue entries stored.
    pub champions: usize,
    /// `None` when the rotation was skipped.
    pub weekly: Option<usize>,
}

/// Fetch every data set and store it. The version is saved before the
/// catalogue so a catalogue failure still leaves the newest version visible.
pub async fn sync_once(
    client: &LeagueDataClient,
    store: &dyn RollStore,
) -> Result<SyncReport, LeagueSyncError> {
    let version = client.latest_version().await?;
    store.replace_league_version(version.clone()).await?;

    let champions = client.champions(&version).await?.into_entities();
    let champion_count = champions.len();
    store.upsert_champions(champions).await?;

    let weekly = match client.weekly_rotation().await? {
        Some(rotation) => {
            let ids = rotation.champion_ids();
            let count = ids.len();
            store.replace_weekly_free_champions(ids).await?;
            Some(count)
        }
        None => {
            warn!("no riot API key configured; weekly rotation not refreshed");
            None
        }
    };

    Ok(SyncReport {
        version,
        champions: champion_count,
        weekly,
    })
}

/// Refresh the league data at start-up and then on every interval tick.
pub async fn run(state: SharedState, client: LeagueDataClient) {
    let mut ticker = time::interval(client.config().refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let store = match state.require_roll_store().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "league data refresh skipped");
                continue;
            }
        };

        match sync_once(&client, store.as_ref()).await {
            Ok(report) => info!(
                version = %report.version,
                champions = report.champions,
                weekly = ?report.weekly,
                "league data refreshed"
            ),
            Err(err) => warn!(error = %err, "league data refresh failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_uses_numeric_keys_and_image_names() {
        let raw = r#"{
            "type": "champion",
            "version": "14.1.1",
            "data": {
                "Annie": {"id": "Annie", "key": "1", "name": "Annie", "image": {"full": "Annie.png"}},
                "Olaf": {"id": "Olaf", "key": "2", "name": "Olaf", "image": {"full": "Olaf.png"}}
            }
        }"#;
        let catalogue: ChampionCatalogue = serde_json::from_str(raw).unwrap();
        let champions = catalogue.into_entities();

        assert_eq!(champions.len(), 2);
        assert_eq!(champions[0].id, "1");
        assert_eq!(champions[0].name, "Annie");
        assert_eq!(champions[1].image, "Olaf.png");
    }

    #[test]
    fn rotation_ids_become_strings() {
        let raw = r#"{"freeChampionIds": [1, 22, 103], "maxNewPlayerLevel": 10}"#;
        let rotation: ChampionRotation = serde_json::from_str(raw).unwrap();
        assert_eq!(rotation.champion_ids(), vec!["1", "22", "103"]);
    }

    #[test]
    fn champion_url_substitutes_version() {
        assert_eq!(
            champions_url("https://cdn/{version}/champion.json", "14.1.1"),
            "https://cdn/14.1.1/champion.json"
        );
    }

    #[tokio::test]
    async fn rotation_is_skipped_without_api_key() {
        let client = LeagueDataClient::new(LeagueDataConfig::default()).unwrap();
        assert!(client.weekly_rotation().await.unwrap().is_none());
    }
}
