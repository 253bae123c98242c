#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use cacao_core::model::{
    AchievementId, BadgeViewState, Certificate, Course, CourseId, CourseProgress, Lesson,
    LessonId, NewNotification, NotificationId, NotificationKind, ProgressStats, QuizScore,
    QuizStats, Session, UserProfile,
};
use services::{ApiError, LearningApi, NotificationRecord, UnlockedAchievement};

/// Scriptable backend state.
#[derive(Default)]
pub struct Backend {
    pub courses: Vec<Course>,
    pub progress: HashMap<CourseId, CourseProgress>,
    pub failing_progress: HashSet<CourseId>,
    pub unauthorized: bool,
    pub stats: ProgressStats,
    pub notifications: Vec<NotificationRecord>,
    pub fail_notifications: bool,
    pub created: Vec<NewNotification>,
    pub fail_create_notification: bool,
    pub unlocked: Vec<UnlockedAchievement>,
    pub certificates: Vec<Certificate>,
    /// Moved into `certificates` by create-for-completed.
    pub issuable: Vec<Certificate>,
    pub quiz_scores: Vec<QuizScore>,
    pub quiz_stats: QuizStats,
    pub badge_views: BadgeViewState,
    pub badge_writes: Vec<BadgeViewState>,
    pub fail_badge_write: bool,
    pub read: Vec<NotificationId>,
    pub deleted: Vec<NotificationId>,
}

/// In-process `LearningApi` with call counters.
#[derive(Default)]
pub struct FakeApi {
    backend: Mutex<Backend>,
    calls: Mutex<HashMap<&'static str, usize>>,
    notification_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new(backend: Backend) -> Arc<Self> {
        Arc::new(Self {
            backend: Mutex::new(backend),
            ..Self::default()
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Backend) -> R) -> R {
        f(&mut self.backend.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Hold every notifications fetch until the returned `Notify` fires.
    pub fn gate_notifications(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.notification_gate.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&gate));
        gate
    }

    fn hit(&self, name: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default() += 1;
    }

    fn authed(&self, name: &'static str, token: &str) -> Result<(), ApiError> {
        self.hit(name);
        if token.is_empty() || self.with(|b| b.unauthorized) {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

#[async_trait]
impl LearningApi for FakeApi {
    async fn courses(&self) -> Result<Vec<Course>, ApiError> {
        self.hit("courses");
        Ok(self.with(|b| b.courses.clone()))
    }

    async fn course_progress(
        &self,
        token: &str,
        course_id: &CourseId,
    ) -> Result<CourseProgress, ApiError> {
        self.authed("course_progress", token)?;
        self.with(|b| {
            if b.failing_progress.contains(course_id) {
                return Err(ApiError::Decode("backend unavailable".into()));
            }
            Ok(b.progress
                .get(course_id)
                .cloned()
                .unwrap_or_else(|| CourseProgress::not_started(course_id.clone())))
        })
    }

    async fn progress_stats(&self, token: &str) -> Result<ProgressStats, ApiError> {
        self.authed("progress_stats", token)?;
        Ok(self.with(|b| b.stats))
    }

    async fn notifications(&self, token: &str) -> Result<Vec<NotificationRecord>, ApiError> {
        self.authed("notifications", token)?;
        let gate = self
            .notification_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.with(|b| {
            if b.fail_notifications {
                return Err(ApiError::Decode("backend unavailable".into()));
            }
            Ok(b.notifications.clone())
        })
    }

    async fn create_notification(
        &self,
        token: &str,
        notification: &NewNotification,
    ) -> Result<(), ApiError> {
        self.authed("create_notification", token)?;
        self.with(|b| {
            if b.fail_create_notification {
                return Err(ApiError::Decode("notification rejected".into()));
            }
            b.created.push(notification.clone());
            Ok(())
        })
    }

    async fn mark_notification_read(&self, token: &str, id: &NotificationId) -> Result<(), ApiError> {
        self.authed("mark_notification_read", token)?;
        self.with(|b| b.read.push(id.clone()));
        Ok(())
    }

    async fn mark_all_notifications_read(&self, token: &str) -> Result<(), ApiError> {
        self.authed("mark_all_notifications_read", token)
    }

    async fn delete_notification(&self, token: &str, id: &NotificationId) -> Result<(), ApiError> {
        self.authed("delete_notification", token)?;
        self.with(|b| b.deleted.push(id.clone()));
        Ok(())
    }

    async fn check_achievement_progress(&self, token: &str) -> Result<(), ApiError> {
        self.authed("check_achievement_progress", token)
    }

    async fn unlocked_achievements(
        &self,
        token: &str,
    ) -> Result<Vec<UnlockedAchievement>, ApiError> {
        self.authed("unlocked_achievements", token)?;
        Ok(self.with(|b| b.unlocked.clone()))
    }

    async fn certificates(&self, token: &str) -> Result<Vec<Certificate>, ApiError> {
        self.authed("certificates", token)?;
        Ok(self.with(|b| b.certificates.clone()))
    }

    async fn create_certificates_for_completed(&self, token: &str) -> Result<u32, ApiError> {
        self.authed("create_certificates_for_completed", token)?;
        Ok(self.with(|b| {
            let issued = std::mem::take(&mut b.issuable);
            let count = u32::try_from(issued.len()).unwrap_or(u32::MAX);
            b.certificates.extend(issued);
            count
        }))
    }

    async fn download_certificate(
        &self,
        token: &str,
        course_id: &CourseId,
    ) -> Result<Vec<u8>, ApiError> {
        self.authed("download_certificate", token)?;
        Ok(format!("%PDF {course_id}").into_bytes())
    }

    async fn quiz_scores(&self, token: &str) -> Result<Vec<QuizScore>, ApiError> {
        self.authed("quiz_scores", token)?;
        Ok(self.with(|b| b.quiz_scores.clone()))
    }

    async fn quiz_stats(&self, token: &str) -> Result<QuizStats, ApiError> {
        self.authed("quiz_stats", token)?;
        Ok(self.with(|b| b.quiz_stats))
    }

    async fn badge_views(&self, token: &str) -> Result<BadgeViewState, ApiError> {
        self.authed("badge_views", token)?;
        Ok(self.with(|b| b.badge_views))
    }

    async fn update_badge_views(&self, token: &str, views: &BadgeViewState) -> Result<(), ApiError> {
        self.authed("update_badge_views", token)?;
        self.with(|b| {
            b.badge_writes.push(*views);
            if b.fail_badge_write {
                return Err(ApiError::Decode("write rejected".into()));
            }
            b.badge_views = *views;
            Ok(())
        })
    }
}

pub fn learner() -> Session {
    Session::new(
        Some("token-ana".into()),
        UserProfile {
            id: None,
            name: "Ana Cruz".into(),
            email: Some("ana@farm.ph".into()),
        },
    )
}

pub fn course(id: &str, lessons: u32, catalog_progress: f64) -> Course {
    let lessons = (1..=lessons)
        .map(|n| Lesson::new(LessonId::new(format!("{id}-l{n}")), format!("Lesson {n}"), n))
        .collect();
    Course::new(CourseId::new(id), format!("Course {id}"), lessons)
        .with_catalog_progress(catalog_progress)
}

pub fn progress(id: &str, overall: f64, lessons: u32) -> CourseProgress {
    CourseProgress::new(
        CourseId::new(id),
        overall,
        (1..=lessons)
            .map(|n| LessonId::new(format!("{id}-l{n}")))
            .collect(),
    )
}

pub fn notification(id: &str, title: &str, read: bool) -> NotificationRecord {
    NotificationRecord {
        id: NotificationId::new(id),
        kind: NotificationKind::System,
        title: title.to_string(),
        message: format!("{title} message"),
        created_at: None,
        read,
        icon: None,
        action_url: None,
        action_text: None,
    }
}

pub fn certificate(course_id: &str) -> Certificate {
    Certificate {
        id: format!("cert-{course_id}"),
        course_id: CourseId::new(course_id),
        title: format!("Course {course_id}"),
        description: "Completed".into(),
        category: "beginner".into(),
        score: 95.0,
        verification_code: None,
        issue_date: None,
    }
}

pub fn quiz_score(id: &str, score: f64) -> QuizScore {
    QuizScore {
        quiz_id: id.to_string(),
        quiz_name: format!("Quiz {id}"),
        score,
        total_questions: 10,
        correct_answers: 8,
        completed_at: None,
    }
}

pub fn unlocked(id: &str) -> UnlockedAchievement {
    UnlockedAchievement {
        id: AchievementId::new(id),
        name: None,
    }
}
