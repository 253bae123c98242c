//! REST contract of the learning backend.
//!
//! Services depend on [`LearningApi`] only; [`HttpLearningApi`] is the reqwest
//! implementation and tests substitute in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cacao_core::model::{
    AchievementId, BadgeViewState, Certificate, Course, CourseId, CourseProgress, NewNotification,
    NotificationId, NotificationKind, ProgressStats, QuizScore, QuizStats,
};

use crate::error::ApiError;

mod http;
mod wire;

pub use http::HttpLearningApi;

/// A notification as delivered by the backend, before feed formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
    pub read: bool,
    pub icon: Option<String>,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
}

/// An achievement the backend reports as unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedAchievement {
    pub id: AchievementId,
    pub name: Option<String>,
}

/// Every backend call the dashboard makes. Authenticated calls take the
/// session token.
#[async_trait]
pub trait LearningApi: Send + Sync {
    /// Public course catalog.
    async fn courses(&self) -> Result<Vec<Course>, ApiError>;

    /// Progress for one course. A course the learner never opened comes back
    /// as not started.
    async fn course_progress(
        &self,
        token: &str,
        course_id: &CourseId,
    ) -> Result<CourseProgress, ApiError>;

    async fn progress_stats(&self, token: &str) -> Result<ProgressStats, ApiError>;

    async fn notifications(&self, token: &str) -> Result<Vec<NotificationRecord>, ApiError>;

    async fn create_notification(
        &self,
        token: &str,
        notification: &NewNotification,
    ) -> Result<(), ApiError>;

    async fn mark_notification_read(&self, token: &str, id: &NotificationId)
    -> Result<(), ApiError>;

    async fn mark_all_notifications_read(&self, token: &str) -> Result<(), ApiError>;

    async fn delete_notification(&self, token: &str, id: &NotificationId) -> Result<(), ApiError>;

    /// Ask the backend to re-check achievement progress (it may create
    /// notifications as a side effect).
    async fn check_achievement_progress(&self, token: &str) -> Result<(), ApiError>;

    async fn unlocked_achievements(&self, token: &str)
    -> Result<Vec<UnlockedAchievement>, ApiError>;

    async fn certificates(&self, token: &str) -> Result<Vec<Certificate>, ApiError>;

    /// Returns how many certificates were created.
    async fn create_certificates_for_completed(&self, token: &str) -> Result<u32, ApiError>;

    /// Certificate PDF bytes.
    async fn download_certificate(
        &self,
        token: &str,
        course_id: &CourseId,
    ) -> Result<Vec<u8>, ApiError>;

    async fn quiz_scores(&self, token: &str) -> Result<Vec<QuizScore>, ApiError>;

    async fn quiz_stats(&self, token: &str) -> Result<QuizStats, ApiError>;

    async fn badge_views(&self, token: &str) -> Result<BadgeViewState, ApiError>;

    async fn update_badge_views(&self, token: &str, views: &BadgeViewState)
    -> Result<(), ApiError>;
}
