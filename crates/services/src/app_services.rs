use std::sync::Arc;

use tracing::{debug, info, warn};

use cacao_core::model::Session;
use storage::repository::{SessionRepository, Storage};

use crate::Clock;
use crate::api::{HttpLearningApi, LearningApi};
use crate::config::{AppConfig, DashboardConfig};
use crate::dashboard::Dashboard;
use crate::error::AppServicesError;

/// Assembles the REST client, local storage and the resolved session.
#[derive(Clone)]
pub struct AppServices {
    api: Arc<dyn LearningApi>,
    storage: Storage,
    clock: Clock,
    session: Session,
    dashboard_config: DashboardConfig,
}

impl AppServices {
    /// Build services from validated configuration, backed by `SQLite` storage.
    ///
    /// The session is the configured token if there is one (and is then
    /// remembered), else the stored session, else a guest.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage cannot be opened or the HTTP
    /// client cannot be built.
    pub async fn new(config: &AppConfig) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.cache_db).await?;
        let api: Arc<dyn LearningApi> = Arc::new(HttpLearningApi::new(config.settings.clone())?);
        let session = resolve_session(storage.sessions.as_ref(), config.session.clone()).await;
        info!(api = %config.settings.api_base_url(), guest = session.is_guest(), "services ready");

        Ok(Self {
            api,
            storage,
            clock: Clock::default_clock(),
            session,
            dashboard_config: config.dashboard,
        })
    }

    /// Build services from explicit parts.
    #[must_use]
    pub fn with_parts(
        api: Arc<dyn LearningApi>,
        storage: Storage,
        clock: Clock,
        session: Session,
        dashboard_config: DashboardConfig,
    ) -> Self {
        Self {
            api,
            storage,
            clock,
            session,
            dashboard_config,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn LearningApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// A fresh dashboard for the resolved session.
    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(
            self.session.clone(),
            Arc::clone(&self.api),
            &self.storage,
            self.clock,
            self.dashboard_config,
        )
    }

    /// Forget the stored session.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the session cannot be cleared.
    pub async fn sign_out(&self) -> Result<(), AppServicesError> {
        self.storage.sessions.clear_session().await?;
        info!("signed out");
        Ok(())
    }
}

async fn resolve_session(sessions: &dyn SessionRepository, configured: Option<Session>) -> Session {
    if let Some(session) = configured {
        if let Err(err) = sessions.save_session(&session).await {
            warn!(error = %err, "failed to remember session");
        }
        return session;
    }
    match sessions.load_session().await {
        Ok(Some(session)) => {
            debug!("using stored session");
            session
        }
        Ok(None) => Session::guest(),
        Err(err) => {
            warn!(error = %err, "stored session unreadable, continuing as guest");
            Session::guest()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacao_core::model::UserProfile;
    use storage::InMemoryRepository;

    fn ana() -> Session {
        Session::new(
            Some("tok".into()),
            UserProfile {
                id: None,
                name: "Ana Cruz".into(),
                email: Some("ana@farm.ph".into()),
            },
        )
    }

    #[tokio::test]
    async fn configured_session_is_remembered() {
        let repo = InMemoryRepository::new();
        let session = resolve_session(&repo, Some(ana())).await;
        assert_eq!(session, ana());
        assert_eq!(repo.load_session().await.unwrap(), Some(ana()));
    }

    #[tokio::test]
    async fn falls_back_to_stored_then_guest() {
        let repo = InMemoryRepository::new();
        assert!(resolve_session(&repo, None).await.is_guest());

        repo.save_session(&ana()).await.unwrap();
        assert_eq!(resolve_session(&repo, None).await, ana());
    }
}
