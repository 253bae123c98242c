//! Runtime configuration: environment first, command-line overrides on top.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use cacao_core::model::{
    ClientSettings, ClientSettingsDraft, ClientSettingsError, DEFAULT_POLL_INTERVAL_SECS,
    Session, UserId, UserProfile,
};

use crate::events::DEFAULT_EVENT_CAPACITY;

pub const DEFAULT_CACHE_DB: &str = "sqlite://cacao-cache.sqlite3?mode=rwc";

pub const ENV_API_BASE_URL: &str = "CACAO_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "CACAO_API_TOKEN";
pub const ENV_USER_EMAIL: &str = "CACAO_USER_EMAIL";
pub const ENV_USER_NAME: &str = "CACAO_USER_NAME";
pub const ENV_USER_ID: &str = "CACAO_USER_ID";
pub const ENV_CACHE_DB: &str = "CACAO_CACHE_DB";
pub const ENV_POLL_SECS: &str = "CACAO_POLL_SECS";

/// Timing and buffering knobs for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardConfig {
    pub poll_interval: Duration,
    pub event_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error(transparent)]
    Settings(#[from] ClientSettingsError),
}

/// Unvalidated configuration. Every field is optional; `None` means default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfigDraft {
    pub api_base_url: Option<String>,
    pub token: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub cache_db: Option<String>,
    pub poll_secs: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub settings: ClientSettings,
    /// Session built from the configured token and profile; `None` when no
    /// token was configured, so a stored session may be used instead.
    pub session: Option<Session>,
    pub cache_db: String,
    pub dashboard: DashboardConfig,
}

impl AppConfigDraft {
    /// Read the `CACAO_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a draft from any key lookup; `from_env` uses the process environment.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            let value = lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            if value.is_none() {
                debug!("{key} not set, using default");
            }
            value
        };
        Self {
            api_base_url: read(ENV_API_BASE_URL),
            token: read(ENV_API_TOKEN),
            email: read(ENV_USER_EMAIL),
            name: read(ENV_USER_NAME),
            user_id: read(ENV_USER_ID),
            cache_db: read(ENV_CACHE_DB),
            poll_secs: read(ENV_POLL_SECS),
        }
    }

    /// Fields set in `overrides` replace ours.
    #[must_use]
    pub fn overlay(self, overrides: Self) -> Self {
        Self {
            api_base_url: overrides.api_base_url.or(self.api_base_url),
            token: overrides.token.or(self.token),
            email: overrides.email.or(self.email),
            name: overrides.name.or(self.name),
            user_id: overrides.user_id.or(self.user_id),
            cache_db: overrides.cache_db.or(self.cache_db),
            poll_secs: overrides.poll_secs.or(self.poll_secs),
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is invalid or the poll interval
    /// is not a positive whole number.
    pub fn validate(self) -> Result<AppConfig, ConfigError> {
        let poll_interval_secs = match self.poll_secs {
            None => None,
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                warn!("invalid {ENV_POLL_SECS} value: {raw}");
                ConfigError::InvalidNumber {
                    key: ENV_POLL_SECS,
                    value: raw.clone(),
                }
            })?),
        };

        let settings = ClientSettingsDraft {
            api_base_url: self.api_base_url,
            poll_interval_secs,
        }
        .validate()?;

        let session = self.token.map(|token| {
            let profile = UserProfile {
                id: self.user_id.map(UserId::new),
                name: self.name.unwrap_or_else(|| "User".to_string()),
                email: self.email,
            };
            Session::new(Some(token), profile)
        });

        let cache_db = self.cache_db.unwrap_or_else(|| {
            info!("{ENV_CACHE_DB} not set, using default: {DEFAULT_CACHE_DB}");
            DEFAULT_CACHE_DB.to_string()
        });

        let dashboard = DashboardConfig {
            poll_interval: settings.poll_interval(),
            ..DashboardConfig::default()
        };

        Ok(AppConfig {
            settings,
            session,
            cache_db,
            dashboard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfigDraft::from_lookup(|_| None).validate().unwrap();
        assert_eq!(config.settings.api_base_url(), "http://localhost:5000/api");
        assert_eq!(config.cache_db, DEFAULT_CACHE_DB);
        assert_eq!(config.dashboard, DashboardConfig::default());
        assert!(config.session.is_none());
    }

    #[test]
    fn overrides_win_over_environment() {
        let env = AppConfigDraft::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "https://cacao.example/api/"),
            (ENV_POLL_SECS, "30"),
            (ENV_API_TOKEN, "env-token"),
            (ENV_USER_NAME, "Ana Cruz"),
        ]));
        let cli = AppConfigDraft {
            poll_secs: Some("5".into()),
            email: Some("ana@farm.ph".into()),
            ..AppConfigDraft::default()
        };

        let config = env.overlay(cli).validate().unwrap();
        assert_eq!(config.settings.api_base_url(), "https://cacao.example/api");
        assert_eq!(config.dashboard.poll_interval, Duration::from_secs(5));
        let session = config.session.unwrap();
        assert_eq!(session.token(), Some("env-token"));
        assert_eq!(session.profile().name, "Ana Cruz");
        assert_eq!(session.user_key().as_str(), "ana_farm_ph");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let draft = AppConfigDraft::from_lookup(lookup(&[(ENV_API_TOKEN, "   ")]));
        assert_eq!(draft.token, None);
    }

    #[test]
    fn rejects_bad_poll_interval() {
        let draft = AppConfigDraft {
            poll_secs: Some("soon".into()),
            ..AppConfigDraft::default()
        };
        assert!(matches!(
            draft.validate(),
            Err(ConfigError::InvalidNumber { key: ENV_POLL_SECS, .. })
        ));

        let draft = AppConfigDraft {
            poll_secs: Some("0".into()),
            ..AppConfigDraft::default()
        };
        assert!(matches!(
            draft.validate(),
            Err(ConfigError::Settings(ClientSettingsError::ZeroPollInterval))
        ));
    }
}
