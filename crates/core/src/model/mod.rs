mod app_settings;
mod badge;
mod certificate;
mod course;
mod ids;
pub mod notification;
mod progress;
mod stats;
mod user;

pub use app_settings::{
    ClientSettings, ClientSettingsDraft, ClientSettingsError, DEFAULT_API_BASE_URL,
    DEFAULT_POLL_INTERVAL_SECS,
};
pub use badge::{BadgeCategory, BadgeCounts, BadgeViewState, DashboardTab, UnknownTab};
pub use certificate::{Certificate, DEFAULT_CERTIFICATE_SCORE, QuizScore, QuizStats};
pub use course::{Course, Lesson};
pub use ids::{AchievementId, CourseId, LessonId, NotificationId, ParseIdError, UserId};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use progress::{Completion, CourseProgress};
pub use stats::{LearnerCounters, ProgressStats, ProgressTotals, percentage};
pub use user::{GUEST_NAME, Session, UserKey, UserProfile};
