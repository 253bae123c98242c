use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Validated client settings: where the backend lives and how often to poll it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSettings {
    api_base_url: String,
    poll_interval: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct ClientSettingsDraft {
    pub api_base_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientSettingsError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("base URL must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("poll interval must be at least one second")]
    ZeroPollInterval,
}

impl ClientSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft.
    ///
    /// A trailing slash on the base URL is dropped so paths can be appended.
    ///
    /// # Errors
    ///
    /// Returns `ClientSettingsError` if the URL does not parse, is not http(s),
    /// or the poll interval is zero.
    pub fn validate(self) -> Result<ClientSettings, ClientSettingsError> {
        let raw = normalize_optional(self.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let trimmed = raw.trim_end_matches('/');
        let parsed =
            Url::parse(trimmed).map_err(|_| ClientSettingsError::InvalidBaseUrl(raw.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientSettingsError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }

        let secs = self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if secs == 0 {
            return Err(ClientSettingsError::ZeroPollInterval);
        }

        Ok(ClientSettings {
            api_base_url: trimmed.to_string(),
            poll_interval: Duration::from_secs(secs),
        })
    }
}

impl ClientSettings {
    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Base URL joined with an endpoint path such as `/notifications`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url,
            path.trim_start_matches('/')
        )
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
