//! Application-level configuration: JSON file first, environment variables on
//! top, validated values last.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LOI_BACK_CONFIG_PATH";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_TIMER_MS: u64 = 5 * 60 * 1000;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_VERSIONS_URL: &str = "https://ddragon.leagueoflegends.com/api/versions.json";
const DEFAULT_CHAMPIONS_URL: &str =
    "https://ddragon.leagueoflegends.com/cdn/{version}/data/en_US/champion.json";
const DEFAULT_ROTATION_URL: &str =
    "https://na1.api.riotgames.com/lol/platform/v3/champion-rotations";

/// Persistence backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Documents in a MongoDB deployment.
    Mongo,
    /// Process-local tables, lost on restart.
    Memory,
}

/// Endpoints and cadence of the league data refresh.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct LeagueDataConfig {
    /// Seconds between two refreshes.
    #[validate(range(min = 60))]
    pub refresh_interval_secs: u64,
    /// Published list of game versions, newest first.
    pub versions_url: String,
    /// Champion catalogue URL; `{version}` is replaced by the latest version.
    pub champions_url: String,
    /// Weekly free rotation endpoint.
    pub rotation_url: String,
    /// Riot API key; the weekly rotation is skipped without one.
    pub riot_api_key: Option<String>,
}

impl LeagueDataConfig {
    /// Refresh period as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for LeagueDataConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            versions_url: DEFAULT_VERSIONS_URL.into(),
            champions_url: DEFAULT_CHAMPIONS_URL.into(),
            rotation_url: DEFAULT_ROTATION_URL.into(),
            riot_api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Roll store backend.
    pub storage: StorageBackend,
    /// MongoDB connection string.
    pub mongo_uri: String,
    /// Database name; the backend default is used when absent.
    pub mongo_db: Option<String>,
    /// Countdown shown to viewers after each roll, in milliseconds.
    #[validate(range(min = 1000))]
    pub timer_ms: u64,
    /// Chat-platform guild hosting the voice channel.
    pub guild_id: String,
    /// Voice channel whose members make up the lobby roster.
    pub channel_id: String,
    /// League data refresh settings.
    #[validate(nested)]
    pub league: LeagueDataConfig,
    /// Directory holding the front-end bundle, served as a fallback route.
    pub static_dir: Option<PathBuf>,
    /// Draw from the whole catalogue when a player owns no champion.
    pub fallback_to_all_champions: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            storage: StorageBackend::Mongo,
            mongo_uri: DEFAULT_MONGO_URI.into(),
            mongo_db: None,
            timer_ms: DEFAULT_TIMER_MS,
            guild_id: String::new(),
            channel_id: String::new(),
            league: LeagueDataConfig::default(),
            static_dir: None,
            fallback_to_all_champions: false,
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk and the process environment, falling
    /// back to built-in defaults for anything missing or invalid.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        let mut config = Self::from(raw);
        config.apply_env(|key| env::var(key).ok());
        config.sanitized()
    }

    /// Override fields from environment-style variables returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = lookup("PORT").or_else(|| lookup("SERVER_PORT")) {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(err) => warn!(value = %port, error = %err, "ignoring invalid PORT"),
            }
        }
        if let Some(uri) = lookup("MONGO_URI") {
            self.mongo_uri = uri;
        }
        if let Some(db) = lookup("MONGO_DB") {
            self.mongo_db = Some(db);
        }
        if let Some(timer) = lookup("TIMER_TIME") {
            match timer.parse::<u64>() {
                Ok(timer) => self.timer_ms = timer,
                Err(err) => warn!(value = %timer, error = %err, "ignoring invalid TIMER_TIME"),
            }
        }
        if let Some(guild) = lookup("DISCORD_GUILD_ID") {
            self.guild_id = guild;
        }
        if let Some(channel) = lookup("DISCORD_CHANNEL_ID") {
            self.channel_id = channel;
        }
        if let Some(key) = lookup("RIOT_API_KEY") {
            self.league.riot_api_key = Some(key);
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }
    }

    /// Replace every field failing validation by its default.
    pub fn sanitized(mut self) -> Self {
        if self.validate().is_ok() {
            return self;
        }

        if self.timer_ms < 1000 {
            warn!(
                timer_ms = self.timer_ms,
                default = DEFAULT_TIMER_MS,
                "roll timer below 1000 ms; using default"
            );
            self.timer_ms = DEFAULT_TIMER_MS;
        }
        if self.league.validate().is_err() {
            warn!(
                refresh_interval_secs = self.league.refresh_interval_secs,
                default = DEFAULT_REFRESH_INTERVAL_SECS,
                "league refresh interval below 60 s; using default"
            );
            self.league.refresh_interval_secs = DEFAULT_REFRESH_INTERVAL_SECS;
        }
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    storage: Option<StorageBackend>,
    mongo_uri: Option<String>,
    mongo_db: Option<String>,
    timer_ms: Option<u64>,
    guild_id: Option<String>,
    channel_id: Option<String>,
    league: RawLeagueConfig,
    static_dir: Option<PathBuf>,
    fallback_to_all_champions: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawLeagueConfig {
    refresh_interval_secs: Option<u64>,
    versions_url: Option<String>,
    champions_url: Option<String>,
    rotation_url: Option<String>,
    riot_api_key: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let league_defaults = defaults.league.clone();
        Self {
            port: value.port.unwrap_or(defaults.port),
            storage: value.storage.unwrap_or(defaults.storage),
            mongo_uri: value.mongo_uri.unwrap_or(defaults.mongo_uri),
            mongo_db: value.mongo_db.or(defaults.mongo_db),
            timer_ms: value.timer_ms.unwrap_or(defaults.timer_ms),
            guild_id: value.guild_id.unwrap_or(defaults.guild_id),
            channel_id: value.channel_id.unwrap_or(defaults.channel_id),
            league: LeagueDataConfig {
                refresh_interval_secs: value
                    .league
                    .refresh_interval_secs
                    .unwrap_or(league_defaults.refresh_interval_secs),
                versions_url: value
                    .league
                    .versions_url
                    .unwrap_or(league_defaults.versions_url),
                champions_url: value
                    .league
                    .champions_url
                    .unwrap_or(league_defaults.champions_url),
                rotation_url: value
                    .league
                    .rotation_url
                    .unwrap_or(league_defaults.rotation_url),
                riot_api_key: value.league.riot_api_key.or(league_defaults.riot_api_key),
            },
            static_dir: value.static_dir.or(defaults.static_dir),
            fallback_to_all_champions: value
                .fallback_to_all_champions
                .unwrap_or(defaults.fallback_to_all_champions),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_json(json: &str) -> AppConfig {
        AppConfig::from(serde_json::from_str::<RawConfig>(json).unwrap())
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = from_json(r#"{"guildId": "g1", "league": {"riotApiKey": "key"}}"#);
        assert_eq!(config.guild_id, "g1");
        assert_eq!(config.timer_ms, DEFAULT_TIMER_MS);
        assert_eq!(config.storage, StorageBackend::Mongo);
        assert_eq!(config.league.riot_api_key.as_deref(), Some("key"));
        assert_eq!(config.league.versions_url, DEFAULT_VERSIONS_URL);
        assert!(!config.fallback_to_all_champions);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = from_json(r#"{"port": 9000, "timerMs": 60000, "storage": "memory"}"#);
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SERVER_PORT", "9100"),
            ("TIMER_TIME", "120000"),
            ("DISCORD_CHANNEL_ID", "c9"),
            ("MONGO_URI", "  "),
        ]);
        config.apply_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.port, 9100);
        assert_eq!(config.timer_ms, 120_000);
        assert_eq!(config.channel_id, "c9");
        assert_eq!(config.mongo_uri, DEFAULT_MONGO_URI);
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn unparsable_environment_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == "TIMER_TIME").then(|| "soon".to_string()));
        assert_eq!(config.timer_ms, DEFAULT_TIMER_MS);
    }

    #[test]
    fn invalid_values_are_replaced_by_defaults() {
        let config =
            from_json(r#"{"timerMs": 10, "league": {"refreshIntervalSecs": 5}}"#).sanitized();
        assert_eq!(config.timer_ms, DEFAULT_TIMER_MS);
        assert_eq!(config.league.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
    }
}
