use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use cacao_core::Clock;
use cacao_core::model::notification::{DEFAULT_ICON, retain_clean};
use cacao_core::model::{Notification, NotificationId, Session, UserKey};
use cacao_core::time::relative_label;
use storage::repository::NotificationCache;

use crate::api::{LearningApi, NotificationRecord};
use crate::error::NotificationError;

/// Outcome of a refresh request.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    /// The feed was fetched and the cache replaced.
    Updated(Vec<Notification>),
    /// Another refresh was already in flight; this one was dropped.
    Skipped,
}

/// Fetches, formats, filters and caches the notification feed.
pub struct NotificationService {
    clock: Clock,
    api: Arc<dyn LearningApi>,
    cache: Arc<dyn NotificationCache>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the refresh ends, including on error.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl NotificationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        api: Arc<dyn LearningApi>,
        cache: Arc<dyn NotificationCache>,
    ) -> Self {
        Self {
            clock,
            api,
            cache,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The cached feed, for painting before the first fetch completes.
    ///
    /// Corrupted entries left by older clients are removed from the cache.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Storage` if the cache cannot be read.
    pub async fn cached(&self, session: &Session) -> Result<Vec<Notification>, NotificationError> {
        let user = session.user_key();
        let cached = self.cache.cached_notifications(&user).await?;
        let before = cached.len();
        let clean = retain_clean(cached);
        if clean.len() != before {
            debug!(removed = before - clean.len(), "dropping corrupted cached notifications");
            self.write_cache(&user, &clean).await;
        }
        Ok(clean)
    }

    /// Fetch the feed and replace the cache with it.
    ///
    /// Returns [`Refresh::Skipped`] when another refresh is still running.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Guest` for guest sessions and
    /// `NotificationError::Api` if the fetch fails (the cache is left as is).
    pub async fn refresh(&self, session: &Session) -> Result<Refresh, NotificationError> {
        let token = token(session)?;
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("notification refresh already in flight");
            return Ok(Refresh::Skipped);
        };

        let records = self.api.notifications(token).await?;
        let now = self.clock.now();
        let fetched = records.len();
        let notifications = retain_clean(
            records
                .into_iter()
                .map(|record| to_notification(record, now))
                .collect(),
        );
        debug!(fetched, kept = notifications.len(), "notifications refreshed");

        self.write_cache(&session.user_key(), &notifications).await;
        Ok(Refresh::Updated(notifications))
    }

    /// # Errors
    ///
    /// Returns `NotificationError` if the session is a guest, the backend call
    /// fails, or the cache cannot be read.
    pub async fn mark_read(
        &self,
        session: &Session,
        id: &NotificationId,
    ) -> Result<Vec<Notification>, NotificationError> {
        self.api.mark_notification_read(token(session)?, id).await?;
        self.update_cache(session, |list| {
            for notification in list.iter_mut().filter(|n| &n.id == id) {
                notification.read = true;
            }
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotificationError` if the session is a guest, the backend call
    /// fails, or the cache cannot be read.
    pub async fn mark_all_read(
        &self,
        session: &Session,
    ) -> Result<Vec<Notification>, NotificationError> {
        self.api.mark_all_notifications_read(token(session)?).await?;
        self.update_cache(session, |list| {
            for notification in list.iter_mut() {
                notification.read = true;
            }
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotificationError` if the session is a guest, the backend call
    /// fails, or the cache cannot be read.
    pub async fn delete(
        &self,
        session: &Session,
        id: &NotificationId,
    ) -> Result<Vec<Notification>, NotificationError> {
        self.api.delete_notification(token(session)?, id).await?;
        self.update_cache(session, |list| list.retain(|n| &n.id != id))
            .await
    }

    async fn update_cache(
        &self,
        session: &Session,
        edit: impl FnOnce(&mut Vec<Notification>),
    ) -> Result<Vec<Notification>, NotificationError> {
        let user = session.user_key();
        let mut list = self.cache.cached_notifications(&user).await?;
        edit(&mut list);
        self.write_cache(&user, &list).await;
        Ok(list)
    }

    async fn write_cache(&self, user: &UserKey, notifications: &[Notification]) {
        if let Err(err) = self.cache.replace_notifications(user, notifications).await {
            warn!(error = %err, "failed to cache notifications");
        }
    }
}

fn token(session: &Session) -> Result<&str, NotificationError> {
    session.auth_token().ok_or(NotificationError::Guest)
}

fn to_notification(record: NotificationRecord, now: chrono::DateTime<chrono::Utc>) -> Notification {
    let time = record
        .created_at
        .map_or_else(|| "Just now".to_string(), |at| relative_label(at, now));
    Notification {
        id: record.id,
        kind: record.kind,
        title: record.title,
        message: record.message,
        created_at: record.created_at,
        time,
        read: record.read,
        icon: record.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        action_url: record.action_url,
        action_text: record.action_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacao_core::model::NotificationKind;
    use cacao_core::time::fixed_now;
    use chrono::Duration;

    fn record(created_minutes_ago: Option<i64>, icon: Option<&str>) -> NotificationRecord {
        NotificationRecord {
            id: NotificationId::new("n1"),
            kind: NotificationKind::System,
            title: "Welcome".into(),
            message: "Hello".into(),
            created_at: created_minutes_ago.map(|m| fixed_now() - Duration::minutes(m)),
            read: false,
            icon: icon.map(ToString::to_string),
            action_url: None,
            action_text: None,
        }
    }

    #[test]
    fn formats_time_and_defaults_icon() {
        let n = to_notification(record(Some(5), None), fixed_now());
        assert_eq!(n.time, "5 minutes ago");
        assert_eq!(n.icon, DEFAULT_ICON);

        let n = to_notification(record(None, Some("award")), fixed_now());
        assert_eq!(n.time, "Just now");
        assert_eq!(n.icon, "award");
    }

    #[test]
    fn in_flight_guard_resets_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = InFlight::acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlight::acquire(&flag).is_none());
        drop(guard);
        assert!(InFlight::acquire(&flag).is_some());
    }
}
