//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the REST client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("token rejected by the backend")]
    Unauthorized,
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `AchievementService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AchievementError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NotificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationError {
    #[error("sign in to manage notifications")]
    Guest,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RecordsService` (certificates and quiz scores).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordsError {
    #[error("sign in to download certificates")]
    Guest,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `Dashboard`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Achievement(#[from] AchievementError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Records(#[from] RecordsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DashboardError {
    /// True when the underlying failure was a rejected token.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Progress(ProgressError::Api(e))
            | Self::Achievement(AchievementError::Api(e))
            | Self::Notification(NotificationError::Api(e))
            | Self::Records(RecordsError::Api(e)) => e.is_unauthorized(),
            _ => false,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
