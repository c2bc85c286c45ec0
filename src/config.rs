use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;
use url::Url;

use crate::auth::{Authenticator, Sessions};
use crate::error::{ApplicationError, ConfigLoadSnafu, ConnectStoreSnafu};
use crate::model::VisitorHasher;
use crate::service::{GateMode, TrackerSettings, ViewTracker};
use crate::store::{KeyValueStore, MemoryStore, RedisStore};

/// Salt used when `IP_SALT` is missing. Visitor tokens become predictable
/// with it, so startup warns loudly.
const FALLBACK_SALT: &str = "viewcount-default-salt";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(flatten)]
    pub store: StoreConfig,
    #[serde(flatten)]
    pub views: ViewsConfig,
    #[serde(flatten)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    #[serde(rename = "store_url")]
    pub url: Option<Url>,
    #[serde(rename = "store_token")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewsConfig {
    #[serde(rename = "ip_salt")]
    pub salt: Option<String>,
    #[serde(rename = "view_cooldown", default = "default_cooldown", deserialize_with = "duration")]
    pub cooldown: Duration,
    #[serde(default = "default_analytics_ttl", deserialize_with = "duration")]
    pub analytics_ttl: Duration,
    #[serde(rename = "view_gate", default)]
    pub gate: GateMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    #[serde(rename = "admin_password_hash")]
    pub password_hash: Option<String>,
    pub session_secret: Option<String>,
    #[serde(default = "default_session_ttl", deserialize_with = "duration")]
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    /// Connects to the configured store, or falls back to a process-local one.
    pub async fn store(&self) -> Result<Arc<dyn KeyValueStore>, ApplicationError> {
        let Some(url) = &self.store.url else {
            tracing::warn!("STORE_URL is not set, counting views in memory; counts reset on restart and are not shared between instances");
            return Ok(Arc::new(MemoryStore::new()));
        };

        let token = self.store.token.clone().map(SecretString::from);
        let store = RedisStore::connect(url, token.as_ref())
            .await
            .context(ConnectStoreSnafu)?;

        Ok(Arc::new(store))
    }

    pub fn tracker(&self, store: Arc<dyn KeyValueStore>) -> ViewTracker {
        let salt = match &self.views.salt {
            Some(salt) if !salt.is_empty() => salt.clone(),
            _ => {
                tracing::warn!("IP_SALT is not set, visitor tokens use a built-in salt and are predictable");
                FALLBACK_SALT.to_string()
            }
        };

        let settings = TrackerSettings {
            cooldown: self.views.cooldown,
            analytics_ttl: self.views.analytics_ttl,
            gate: self.views.gate,
        };

        ViewTracker::new(store, VisitorHasher::new(salt), settings)
    }

    pub fn authenticator(&self) -> Authenticator {
        let sessions = match &self.admin.session_secret {
            Some(secret) if !secret.is_empty() => Some(Sessions::new(
                SecretString::from(secret.clone()),
                self.admin.session_ttl,
            )),
            _ => {
                tracing::info!("SESSION_SECRET is not set, admin logins will not issue session tokens");
                None
            }
        };

        if self.admin.password_hash.is_none() {
            tracing::warn!("ADMIN_PASSWORD_HASH is not set, admin authentication is disabled");
        }

        Authenticator::new(self.admin.password_hash.as_deref(), sessions)
    }
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_cooldown() -> Duration {
    TrackerSettings::default().cooldown
}

fn default_analytics_ttl() -> Duration {
    TrackerSettings::default().analytics_ttl
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

/// Parses human readable durations such as `15m` or `24h`.
fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply() {
        let config: Config = envy::from_iter(vars(&[])).unwrap();

        assert_eq!(config.host, default_host());
        assert_eq!(config.store.url, None);
        assert_eq!(config.views.cooldown, Duration::from_secs(900));
        assert_eq!(config.views.analytics_ttl, Duration::from_secs(86400));
        assert_eq!(config.views.gate, GateMode::Strict);
        assert_eq!(config.admin.session_ttl, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn reads_environment() {
        let config: Config = envy::from_iter(vars(&[
            ("HOST_ADDRESS", "127.0.0.1:8080"),
            ("STORE_URL", "redis://cache:6379"),
            ("STORE_TOKEN", "token"),
            ("IP_SALT", "pepper"),
            ("VIEW_COOLDOWN", "5m"),
            ("VIEW_GATE", "check-then-set"),
            ("ADMIN_PASSWORD_HASH", "abc"),
        ]))
        .unwrap();

        assert_eq!(config.host.port(), 8080);
        assert_eq!(config.store.url.unwrap().as_str(), "redis://cache:6379");
        assert_eq!(config.store.token.as_deref(), Some("token"));
        assert_eq!(config.views.salt.as_deref(), Some("pepper"));
        assert_eq!(config.views.cooldown, Duration::from_secs(300));
        assert_eq!(config.views.gate, GateMode::CheckThenSet);
        assert_eq!(config.admin.password_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_bad_durations() {
        let result = envy::from_iter::<_, Config>(vars(&[("VIEW_COOLDOWN", "soon")]));
        assert!(result.is_err());
    }
}
