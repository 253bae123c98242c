//! The learner dashboard: shared state plus the wiring between progress,
//! achievements, badges, notifications and records.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use cacao_core::Clock;
use cacao_core::achievements::Achievement;
use cacao_core::model::notification::unread_count;
use cacao_core::model::{
    BadgeCategory, BadgeCounts, Certificate, Course, CourseId, CourseProgress, DashboardTab,
    LearnerCounters, Notification, NotificationId, ProgressStats, ProgressTotals, QuizScore,
    QuizStats, Session,
};
use storage::repository::{MarkerKind, MarkerRepository, Storage};

use crate::achievement_service::AchievementService;
use crate::api::LearningApi;
use crate::badge_service::BadgeScheduler;
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::events::{DashboardEvent, EventBus};
use crate::notification_service::{NotificationService, Refresh};
use crate::progress_service::ProgressService;
use crate::records_service::RecordsService;

/// One row of the course list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub overall_progress: f64,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub completed: bool,
}

/// Everything the dashboard renders, captured at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub learner: String,
    pub guest: bool,
    pub active_tab: DashboardTab,
    pub totals: ProgressTotals,
    pub counters: LearnerCounters,
    pub stats: ProgressStats,
    pub courses: Vec<CourseSummary>,
    pub achievements: Vec<Achievement>,
    pub server_achievements: u32,
    pub certificates: Vec<Certificate>,
    pub quiz_scores: Vec<QuizScore>,
    pub quiz_stats: QuizStats,
    pub notifications: Vec<Notification>,
    pub unread_notifications: usize,
    pub visible_badges: Vec<BadgeCategory>,
}

#[derive(Default)]
struct DashboardState {
    catalog: Vec<Course>,
    progress: Vec<CourseProgress>,
    stats: ProgressStats,
    achievements: Vec<Achievement>,
    server_achievements: u32,
    certificates: Vec<Certificate>,
    quiz_scores: Vec<QuizScore>,
    quiz_stats: QuizStats,
    notifications: Vec<Notification>,
    /// Ids from the previous fetch; `None` until the first fetch lands.
    known_notifications: Option<HashSet<NotificationId>>,
}

impl DashboardState {
    fn counters(&self) -> LearnerCounters {
        LearnerCounters::collect(&self.catalog, &self.progress, &self.stats)
    }
}

/// Dashboard for one session. Cloning shares state, timers and the event bus.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

struct Inner {
    session: Session,
    config: DashboardConfig,
    events: EventBus,
    progress: ProgressService,
    achievements: AchievementService,
    notifications: NotificationService,
    records: RecordsService,
    badges: BadgeScheduler,
    markers: Arc<dyn MarkerRepository>,
    state: Mutex<DashboardState>,
    expired: AtomicBool,
}

impl Dashboard {
    #[must_use]
    pub fn new(
        session: Session,
        api: Arc<dyn LearningApi>,
        storage: &Storage,
        clock: Clock,
        config: DashboardConfig,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        let badges = BadgeScheduler::new(Arc::clone(&api), &session, events.clone());
        Self {
            inner: Arc::new(Inner {
                progress: ProgressService::new(Arc::clone(&api), Arc::clone(&storage.progress)),
                achievements: AchievementService::new(
                    Arc::clone(&api),
                    Arc::clone(&storage.markers),
                ),
                notifications: NotificationService::new(
                    clock,
                    Arc::clone(&api),
                    Arc::clone(&storage.notifications),
                ),
                records: RecordsService::new(api),
                markers: Arc::clone(&storage.markers),
                badges,
                events,
                session,
                config,
                state: Mutex::new(DashboardState::default()),
                expired: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn config(&self) -> DashboardConfig {
        self.inner.config
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn badges(&self) -> &BadgeScheduler {
        &self.inner.badges
    }

    /// Full initial load.
    ///
    /// The cached notification feed is shown first; everything else is
    /// fetched live. Failures other than a rejected token fall back to
    /// cached or empty data and are logged.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError` when the backend rejects the token or the
    /// local caches cannot be read.
    pub async fn load(&self) -> Result<DashboardSnapshot, DashboardError> {
        let session = &self.inner.session;
        info!(learner = %session.profile().name, guest = session.is_guest(), "loading dashboard");

        self.inner.badges.load_baseline().await;

        let cached = self.inner.notifications.cached(session).await?;
        self.state().notifications = cached;

        self.refresh_progress().await?;
        self.refresh_certificates().await?;
        self.refresh_quiz().await?;
        self.sync_achievements().await?;
        self.refresh_notifications().await?;
        self.update_badges();

        Ok(self.snapshot())
    }

    /// Switch tabs and refresh what the new tab shows.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError` when the backend rejects the token or a local
    /// cache fails.
    pub async fn activate_tab(&self, tab: DashboardTab) -> Result<DashboardSnapshot, DashboardError> {
        debug!(%tab, "tab activated");
        self.inner.badges.activate(tab);

        match tab {
            DashboardTab::Notifications => self.refresh_notifications().await?,
            DashboardTab::Achievements => {
                self.sync_achievements().await?;
                let counters = self.state().counters();
                self.evaluate_achievements(&counters).await?;
            }
            DashboardTab::Certificates => self.refresh_certificates().await?,
            DashboardTab::Scores => self.refresh_quiz().await?,
            DashboardTab::Dashboard | DashboardTab::Statistics => self.refresh_progress().await?,
            DashboardTab::Profile | DashboardTab::Settings => {}
        }
        self.update_badges();

        Ok(self.snapshot())
    }

    /// One poll tick: notifications, achievements and certificates.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError` when the backend rejects the token.
    pub async fn poll_once(&self) -> Result<(), DashboardError> {
        self.refresh_notifications().await?;
        self.sync_achievements().await?;
        self.refresh_certificates().await?;
        self.update_badges();
        Ok(())
    }

    /// Poll every `poll_interval` until the handle is dropped or the token is
    /// rejected. The first poll runs one interval after the call.
    #[must_use]
    pub fn spawn_polling(&self) -> PollHandle {
        let dashboard = self.clone();
        let period = self.inner.config.poll_interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match dashboard.poll_once().await {
                    Ok(()) => debug!("poll complete"),
                    Err(err) if err.is_unauthorized() => {
                        info!("session expired, polling stopped");
                        break;
                    }
                    Err(err) => warn!(error = %err, "poll failed"),
                }
            }
        });
        PollHandle { handle }
    }

    /// # Errors
    ///
    /// Returns `DashboardError` if the session is a guest or the backend call
    /// fails.
    pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), DashboardError> {
        let result = self.inner.notifications.mark_read(&self.inner.session, id).await;
        let list = self.check(result)?;
        self.replace_notifications(list);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DashboardError` if the session is a guest or the backend call
    /// fails.
    pub async fn mark_all_notifications_read(&self) -> Result<(), DashboardError> {
        let result = self.inner.notifications.mark_all_read(&self.inner.session).await;
        let list = self.check(result)?;
        self.replace_notifications(list);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DashboardError` if the session is a guest or the backend call
    /// fails.
    pub async fn delete_notification(&self, id: &NotificationId) -> Result<(), DashboardError> {
        let result = self.inner.notifications.delete(&self.inner.session, id).await;
        let list = self.check(result)?;
        self.replace_notifications(list);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DashboardError` if the session is a guest or the download fails.
    pub async fn download_certificate(&self, course_id: &CourseId) -> Result<Vec<u8>, DashboardError> {
        let result = self
            .inner
            .records
            .download_certificate(&self.inner.session, course_id)
            .await;
        self.check(result)
    }

    /// Current state without any request.
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        let badges = &self.inner.badges;
        let profile = self.inner.session.profile();
        let state = self.state();
        let courses = state
            .catalog
            .iter()
            .map(|course| {
                let progress = state.progress.iter().find(|p| p.course_id() == course.id());
                CourseSummary {
                    id: course.id().clone(),
                    title: course.title().to_string(),
                    overall_progress: progress.map_or(0.0, CourseProgress::overall_progress),
                    completed_lessons: progress.map_or(0, |p| p.completed_lessons().len()),
                    total_lessons: course.total_lessons(),
                    completed: progress.is_some_and(|p| p.completion(course).is_completed()),
                }
            })
            .collect();

        DashboardSnapshot {
            learner: profile.first_name().to_string(),
            guest: self.inner.session.is_guest(),
            active_tab: badges.active_tab(),
            totals: ProgressTotals::collect(&state.catalog, &state.progress),
            counters: state.counters(),
            stats: state.stats,
            courses,
            achievements: state.achievements.clone(),
            server_achievements: state.server_achievements,
            certificates: state.certificates.clone(),
            quiz_scores: state.quiz_scores.clone(),
            quiz_stats: state.quiz_stats,
            notifications: state.notifications.clone(),
            unread_notifications: unread_count(&state.notifications),
            visible_badges: badges.visible(),
        }
    }

    /// Cancel dwell timers. Polling stops when its handle is dropped.
    pub fn shutdown(&self) {
        self.inner.badges.shutdown();
    }

    async fn refresh_progress(&self) -> Result<(), DashboardError> {
        let session = &self.inner.session;
        let fetched = self.inner.progress.catalog().await;
        if let Some(catalog) = self.recover(fetched, "catalog")? {
            self.state().catalog = catalog;
        }
        let catalog = self.state().catalog.clone();

        let aggregated = self.inner.progress.aggregate(session, &catalog).await;
        if aggregated.unauthorized {
            self.expire();
        }
        if aggregated.failed > 0 {
            debug!(failed = aggregated.failed, "progress served from cache");
        }
        let stats = self.inner.progress.stats(session).await;
        let stats = self.recover(stats, "progress stats")?;

        let counters = {
            let mut state = self.state();
            state.progress = aggregated.entries;
            if let Some(stats) = stats {
                state.stats = stats;
            }
            state.counters()
        };

        self.detect_completions().await?;
        self.evaluate_achievements(&counters).await
    }

    async fn detect_completions(&self) -> Result<(), DashboardError> {
        let session = &self.inner.session;
        let user = session.user_key();
        let completed: Vec<(CourseId, String)> = {
            let state = self.state();
            state
                .catalog
                .iter()
                .filter(|course| {
                    state
                        .progress
                        .iter()
                        .find(|p| p.course_id() == course.id())
                        .is_some_and(|p| p.completion(course).is_completed())
                })
                .map(|course| (course.id().clone(), course.title().to_string()))
                .collect()
        };
        if completed.is_empty() {
            return Ok(());
        }

        let seen = self.inner.markers.seen(&user, MarkerKind::CompletedCourse).await?;
        let fresh: Vec<(CourseId, String)> = completed
            .into_iter()
            .filter(|(id, _)| !seen.contains(id.as_str()))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }

        for (course_id, title) in &fresh {
            info!(course = %course_id, "course completed");
            self.inner.events.publish(DashboardEvent::CourseCompleted {
                course_id: course_id.clone(),
                title: title.clone(),
            });
        }
        let ids: Vec<String> = fresh.iter().map(|(id, _)| id.as_str().to_string()).collect();
        self.inner
            .markers
            .mark_seen(&user, MarkerKind::CompletedCourse, &ids)
            .await?;

        self.refresh_notifications().await?;
        self.refresh_certificates().await?;
        self.refresh_quiz().await?;
        self.sync_achievements().await
    }

    async fn evaluate_achievements(&self, counters: &LearnerCounters) -> Result<(), DashboardError> {
        let evaluation = self.inner.achievements.evaluate(counters);
        debug!(unlocked = evaluation.unlocked_count(), "achievements evaluated");
        self.state().achievements = evaluation.achievements;

        let announced = self
            .inner
            .achievements
            .announce(&self.inner.session, &evaluation.newly_unlocked)
            .await?;
        for achievement in evaluation
            .newly_unlocked
            .iter()
            .filter(|a| announced.contains(&a.id))
        {
            self.inner.events.publish(DashboardEvent::AchievementUnlocked {
                id: achievement.id.clone(),
                title: achievement.title.clone(),
            });
        }
        Ok(())
    }

    async fn sync_achievements(&self) -> Result<(), DashboardError> {
        let result = self.inner.achievements.sync_server(&self.inner.session).await;
        if let Some(server) = self.recover(result, "achievements")? {
            if server.new > 0 {
                debug!(new = server.new, "new achievements from backend");
            }
            self.state().server_achievements = server.unlocked;
        }
        Ok(())
    }

    async fn refresh_certificates(&self) -> Result<(), DashboardError> {
        let result = self.inner.records.certificates(&self.inner.session).await;
        if let Some(certificates) = self.recover(result, "certificates")? {
            self.state().certificates = certificates;
        }
        Ok(())
    }

    async fn refresh_quiz(&self) -> Result<(), DashboardError> {
        let session = &self.inner.session;
        let scores = self.inner.records.quiz_scores(session).await;
        let scores = self.recover(scores, "quiz scores")?;
        let stats = self.inner.records.quiz_stats(session).await;
        let stats = self.recover(stats, "quiz stats")?;

        let mut state = self.state();
        if let Some(scores) = scores {
            state.quiz_scores = scores;
        }
        if let Some(stats) = stats {
            state.quiz_stats = stats;
        }
        Ok(())
    }

    async fn refresh_notifications(&self) -> Result<(), DashboardError> {
        if self.inner.session.is_guest() {
            return Ok(());
        }
        let result = self.inner.notifications.refresh(&self.inner.session).await;
        match self.recover(result, "notifications")? {
            Some(Refresh::Updated(list)) => self.replace_notifications(list),
            Some(Refresh::Skipped) | None => {}
        }
        Ok(())
    }

    fn replace_notifications(&self, list: Vec<Notification>) {
        let arrived: Vec<Notification> = {
            let mut state = self.state();
            let arrived = match &state.known_notifications {
                Some(known) => list
                    .iter()
                    .filter(|n| !n.read && !known.contains(&n.id))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            state.known_notifications = Some(list.iter().map(|n| n.id.clone()).collect());
            state.notifications = list;
            arrived
        };

        for notification in arrived {
            self.inner.events.publish(DashboardEvent::NotificationArrived {
                id: notification.id,
                title: notification.title,
                message: notification.message,
            });
        }
        let (total, unread) = {
            let state = self.state();
            (state.notifications.len(), unread_count(&state.notifications))
        };
        self.inner
            .events
            .publish(DashboardEvent::NotificationsRefreshed { total, unread });
    }

    fn update_badges(&self) {
        let counts = {
            let state = self.state();
            BadgeCounts {
                quiz_scores: count(state.quiz_scores.len()),
                achievements: state.server_achievements,
                certificates: count(state.certificates.len()),
            }
        };
        self.inner.badges.set_counts(counts);
    }

    /// Pass a user-initiated result through, noting a rejected token.
    fn check<T, E>(&self, result: Result<T, E>) -> Result<T, DashboardError>
    where
        E: Into<DashboardError>,
    {
        result.map_err(|err| {
            let err = err.into();
            if err.is_unauthorized() {
                self.expire();
            }
            err
        })
    }

    /// Keep background failures local: log and continue with old data.
    /// A rejected token still ends the operation.
    fn recover<T, E>(&self, result: Result<T, E>, what: &'static str) -> Result<Option<T>, DashboardError>
    where
        E: Into<DashboardError>,
    {
        match self.check(result) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_unauthorized() => Err(err),
            Err(err) => {
                warn!(what, error = %err, "refresh failed, keeping previous data");
                Ok(None)
            }
        }
    }

    fn expire(&self) {
        if !self.inner.expired.swap(true, Ordering::AcqRel) {
            warn!("backend rejected the session token");
            self.inner.events.publish(DashboardEvent::SessionExpired);
        }
    }

    fn state(&self) -> MutexGuard<'_, DashboardState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Stops the poll loop when dropped.
#[derive(Debug)]
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
