use async_trait::async_trait;
use cacao_core::model::{CourseId, CourseProgress, Notification, Session, UserKey};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Which "already handled" set a marker belongs to.
///
/// Each set stops the same event from producing a second notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKind {
    /// Achievement ids confirmed by the backend's unlocked list.
    ServerAchievement,
    /// Achievement ids unlocked by local evaluation.
    LocalAchievement,
    /// Course ids whose completion was already announced.
    CompletedCourse,
}

impl MarkerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerAchievement => "server_achievement",
            Self::LocalAchievement => "local_achievement",
            Self::CompletedCourse => "completed_course",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkerKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server_achievement" => Ok(Self::ServerAchievement),
            "local_achievement" => Ok(Self::LocalAchievement),
            "completed_course" => Ok(Self::CompletedCourse),
            other => Err(StorageError::Serialization(format!(
                "invalid marker kind: {other}"
            ))),
        }
    }
}

/// Last known progress per user and course, read only when the live fetch fails.
#[async_trait]
pub trait ProgressCache: Send + Sync {
    /// Fetch the cached progress for one course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    async fn cached_progress(
        &self,
        user: &UserKey,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Store the latest successfully fetched progress, replacing any older entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be written.
    async fn store_progress(
        &self,
        user: &UserKey,
        progress: &CourseProgress,
    ) -> Result<(), StorageError>;
}

/// Read-through copy of the notification feed, for fast repaint.
#[async_trait]
pub trait NotificationCache: Send + Sync {
    /// Cached notifications in feed order (empty when nothing is cached).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    async fn cached_notifications(&self, user: &UserKey)
    -> Result<Vec<Notification>, StorageError>;

    /// Replace the whole cached feed. An empty slice clears it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be written.
    async fn replace_notifications(
        &self,
        user: &UserKey,
        notifications: &[Notification],
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait MarkerRepository: Send + Sync {
    /// All ids already recorded under `kind` for this user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the markers cannot be read.
    async fn seen(&self, user: &UserKey, kind: MarkerKind) -> Result<BTreeSet<String>, StorageError>;

    /// Record ids as seen. Recording an id twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the markers cannot be written.
    async fn mark_seen(
        &self,
        user: &UserKey,
        kind: MarkerKind,
        ids: &[String],
    ) -> Result<(), StorageError>;
}

/// The signed-in session (token plus profile). At most one is stored.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be read or decoded.
    async fn load_session(&self) -> Result<Option<Session>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be written.
    async fn save_session(&self, session: &Session) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be removed.
    async fn clear_session(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(UserKey, CourseId), CourseProgress>>>,
    notifications: Arc<Mutex<HashMap<UserKey, Vec<Notification>>>>,
    markers: Arc<Mutex<HashMap<(UserKey, MarkerKind), BTreeSet<String>>>>,
    session: Arc<Mutex<Option<Session>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressCache for InMemoryRepository {
    async fn cached_progress(
        &self,
        user: &UserKey,
        course_id: &CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(user.clone(), course_id.clone())).cloned())
    }

    async fn store_progress(
        &self,
        user: &UserKey,
        progress: &CourseProgress,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert(
            (user.clone(), progress.course_id().clone()),
            progress.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl NotificationCache for InMemoryRepository {
    async fn cached_notifications(
        &self,
        user: &UserKey,
    ) -> Result<Vec<Notification>, StorageError> {
        let guard = self.notifications.lock().map_err(poisoned)?;
        Ok(guard.get(user).cloned().unwrap_or_default())
    }

    async fn replace_notifications(
        &self,
        user: &UserKey,
        notifications: &[Notification],
    ) -> Result<(), StorageError> {
        let mut guard = self.notifications.lock().map_err(poisoned)?;
        if notifications.is_empty() {
            guard.remove(user);
        } else {
            guard.insert(user.clone(), notifications.to_vec());
        }
        Ok(())
    }
}

#[async_trait]
impl MarkerRepository for InMemoryRepository {
    async fn seen(&self, user: &UserKey, kind: MarkerKind) -> Result<BTreeSet<String>, StorageError> {
        let guard = self.markers.lock().map_err(poisoned)?;
        Ok(guard.get(&(user.clone(), kind)).cloned().unwrap_or_default())
    }

    async fn mark_seen(
        &self,
        user: &UserKey,
        kind: MarkerKind,
        ids: &[String],
    ) -> Result<(), StorageError> {
        let mut guard = self.markers.lock().map_err(poisoned)?;
        guard
            .entry((user.clone(), kind))
            .or_default()
            .extend(ids.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn load_session(&self) -> Result<Option<Session>, StorageError> {
        let guard = self.session.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self.session.lock().map_err(poisoned)?;
        *guard = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        let mut guard = self.session.lock().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates the local caches behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressCache>,
    pub notifications: Arc<dyn NotificationCache>,
    pub markers: Arc<dyn MarkerRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressCache> = Arc::new(repo.clone());
        let notifications: Arc<dyn NotificationCache> = Arc::new(repo.clone());
        let markers: Arc<dyn MarkerRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo);
        Self {
            progress,
            notifications,
            markers,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacao_core::model::{LessonId, NotificationId, NotificationKind, UserProfile};

    fn user(raw: &str) -> UserKey {
        UserKey::sanitize(raw)
    }

    fn notification(id: &str) -> Notification {
        Notification {
            id: NotificationId::new(id),
            kind: NotificationKind::System,
            title: format!("Title {id}"),
            message: "Body".into(),
            created_at: None,
            time: "Just now".into(),
            read: false,
            icon: "bell".into(),
            action_url: None,
            action_text: None,
        }
    }

    #[tokio::test]
    async fn progress_is_scoped_per_user() {
        let repo = InMemoryRepository::new();
        let course = CourseId::new("c1");
        let entry = CourseProgress::new(course.clone(), 50.0, vec![LessonId::new("l1")]);

        repo.store_progress(&user("ana@farm.ph"), &entry).await.unwrap();

        let own = repo.cached_progress(&user("ana@farm.ph"), &course).await.unwrap();
        assert_eq!(own, Some(entry));
        let other = repo.cached_progress(&user("ben@farm.ph"), &course).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn empty_replace_clears_notifications() {
        let repo = InMemoryRepository::new();
        let key = user("ana");
        repo.replace_notifications(&key, &[notification("n1"), notification("n2")])
            .await
            .unwrap();
        assert_eq!(repo.cached_notifications(&key).await.unwrap().len(), 2);

        repo.replace_notifications(&key, &[]).await.unwrap();
        assert!(repo.cached_notifications(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn markers_accumulate_without_duplicates() {
        let repo = InMemoryRepository::new();
        let key = user("ana");
        repo.mark_seen(&key, MarkerKind::CompletedCourse, &["c1".into(), "c2".into()])
            .await
            .unwrap();
        repo.mark_seen(&key, MarkerKind::CompletedCourse, &["c1".into()])
            .await
            .unwrap();

        let seen = repo.seen(&key, MarkerKind::CompletedCourse).await.unwrap();
        assert_eq!(seen.len(), 2);
        assert!(
            repo.seen(&key, MarkerKind::LocalAchievement)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn session_save_and_clear() {
        let repo = InMemoryRepository::new();
        let session = Session::new(Some("tok".into()), UserProfile::guest());
        repo.save_session(&session).await.unwrap();
        assert_eq!(repo.load_session().await.unwrap(), Some(session));
        repo.clear_session().await.unwrap();
        assert!(repo.load_session().await.unwrap().is_none());
    }

    #[test]
    fn marker_kinds_parse_from_their_names() {
        for kind in [
            MarkerKind::ServerAchievement,
            MarkerKind::LocalAchievement,
            MarkerKind::CompletedCourse,
        ] {
            assert_eq!(kind.as_str().parse::<MarkerKind>().unwrap(), kind);
        }
        assert!("other".parse::<MarkerKind>().is_err());
    }
}
